//! Per-worker driver reuse.
//!
//! Each crawl worker keeps at most one idle driver. A worker checks its driver
//! out for one page and hands it back afterwards; drivers that report
//! themselves unhealthy are quit instead of being kept.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{BrowserDriver, DriverFactory};
use crate::error::Result;

/// Identifies one crawl worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Idle drivers keyed by worker.
pub struct DriverPool {
    factory: Arc<dyn DriverFactory>,
    idle: Mutex<HashMap<WorkerId, Box<dyn BrowserDriver>>>,
}

impl fmt::Debug for DriverPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverPool").finish_non_exhaustive()
    }
}

impl DriverPool {
    #[must_use]
    pub fn new(factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            factory,
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Take the worker's idle driver, or create one.
    pub async fn checkout(&self, worker: WorkerId) -> Result<Box<dyn BrowserDriver>> {
        let reused = self.idle.lock().await.remove(&worker);
        match reused {
            Some(driver) if driver.is_healthy() => {
                tracing::trace!(%worker, "reusing pooled driver");
                Ok(driver)
            }
            Some(mut stale) => {
                quit_logged(&mut stale, worker).await;
                self.factory.create().await
            }
            None => {
                tracing::debug!(%worker, "creating driver");
                self.factory.create().await
            }
        }
    }

    /// Return a driver after use.
    ///
    /// Unhealthy drivers are quit. A driver already parked for the worker is
    /// replaced and quit.
    pub async fn checkin(&self, worker: WorkerId, mut driver: Box<dyn BrowserDriver>) {
        if !driver.is_healthy() {
            tracing::debug!(%worker, "discarding unhealthy driver");
            quit_logged(&mut driver, worker).await;
            return;
        }
        let replaced = self.idle.lock().await.insert(worker, driver);
        if let Some(mut old) = replaced {
            quit_logged(&mut old, worker).await;
        }
    }

    /// Quit every idle driver.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.idle.lock().await.drain().collect();
        let count = drained.len();
        for (worker, mut driver) in drained {
            quit_logged(&mut driver, worker).await;
        }
        tracing::info!(drivers = count, "driver pool shut down");
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }
}

async fn quit_logged(driver: &mut Box<dyn BrowserDriver>, worker: WorkerId) {
    if let Err(error) = driver.quit().await {
        tracing::warn!(%worker, %error, "driver quit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockDriver, MockFactory};

    #[tokio::test]
    async fn checkout_reuses_per_worker() {
        let factory = Arc::new(MockFactory::new(MockDriver::new));
        let pool = DriverPool::new(factory.clone());

        let a = pool.checkout(WorkerId(0)).await.expect("a");
        pool.checkin(WorkerId(0), a).await;
        let again = pool.checkout(WorkerId(0)).await.expect("again");
        assert_eq!(factory.created(), 1);

        let b = pool.checkout(WorkerId(1)).await.expect("b");
        assert_eq!(factory.created(), 2);

        pool.checkin(WorkerId(0), again).await;
        pool.checkin(WorkerId(1), b).await;
        assert_eq!(pool.idle_count().await, 2);
    }

    #[tokio::test]
    async fn unhealthy_drivers_are_quit() {
        let factory = Arc::new(MockFactory::new(|| {
            let mut driver = MockDriver::new();
            driver.healthy = false;
            driver
        }));
        let pool = DriverPool::new(factory.clone());
        let driver = pool.checkout(WorkerId(3)).await.expect("driver");
        pool.checkin(WorkerId(3), driver).await;

        assert_eq!(pool.idle_count().await, 0);
        assert_eq!(factory.counters(0).quits(), 1);
    }

    #[tokio::test]
    async fn shutdown_quits_idle() {
        let factory = Arc::new(MockFactory::new(MockDriver::new));
        let pool = DriverPool::new(factory.clone());
        for worker in 0..3 {
            let driver = pool.checkout(WorkerId(worker)).await.expect("driver");
            pool.checkin(WorkerId(worker), driver).await;
        }
        pool.shutdown().await;
        assert_eq!(pool.idle_count().await, 0);
        for index in 0..3 {
            assert_eq!(factory.counters(index).quits(), 1);
        }
    }

    #[tokio::test]
    async fn checkout_propagates_acquire_failure() {
        let pool = DriverPool::new(Arc::new(MockFactory::failing("no browser")));
        assert!(matches!(
            pool.checkout(WorkerId(0)).await,
            Err(crate::Error::SessionAcquire(_))
        ));
    }
}
