//! Render sessions: acquire a driver, load a page, run the handler chain,
//! tear down.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, Instant};
use uuid::Uuid;

use super::pool::{DriverPool, WorkerId};
use super::screenshot::ScreenshotStore;
use super::{BrowserDriver, DriverFactory};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::interaction::HandlerChain;

/// Upper bound on one driver quit during teardown.
pub const QUIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one render attempt.
///
/// `Idle → DriverAcquired → Navigated → HandlerRunning → Harvested`, with
/// `Failed` reachable from any step; every session ends in `TornDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Idle,
    DriverAcquired,
    Navigated,
    HandlerRunning,
    Harvested,
    Failed,
    TornDown,
}

/// A driver bound to one target URL.
///
/// Dropping a session that still owns its driver schedules the driver's
/// shutdown on the current runtime.
pub struct BrowserSession {
    id: Uuid,
    target_url: String,
    state: SessionState,
    driver: Option<Box<dyn BrowserDriver>>,
}

impl fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("target_url", &self.target_url)
            .field("state", &self.state)
            .field("has_driver", &self.driver.is_some())
            .finish()
    }
}

impl BrowserSession {
    #[must_use]
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_url: target_url.into(),
            state: SessionState::Idle,
            driver: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attach(&mut self, driver: Box<dyn BrowserDriver>) {
        self.driver = Some(driver);
        self.set_state(SessionState::DriverAcquired);
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::trace!(session = %self.id, from = ?self.state, to = ?state, "session state");
        self.state = state;
    }

    /// Quit the driver. Runs at most once; later calls only confirm the
    /// `TornDown` state. Quit errors are logged, and a quit still pending
    /// after [`QUIT_TIMEOUT`] is abandoned.
    pub async fn teardown(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            quit_bounded(driver.as_mut(), self.id).await;
        }
        self.set_state(SessionState::TornDown);
    }

    /// Hand the driver back to a pool instead of quitting it.
    fn release(&mut self) -> Option<Box<dyn BrowserDriver>> {
        let driver = self.driver.take();
        self.set_state(SessionState::TornDown);
        driver
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(session = %id, "session dropped, scheduling teardown");
                handle.spawn(async move {
                    quit_bounded(driver.as_mut(), id).await;
                });
            }
            Err(_) => tracing::warn!(session = %id, "session dropped outside a runtime, driver not quit"),
        }
    }
}

/// Markup harvested by one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// URL that was requested.
    pub url: String,
    /// URL shown after navigation and interaction (redirects included).
    pub final_url: String,
    /// Concatenated handler output.
    pub html: String,
    pub handlers_run: Vec<String>,
    pub screenshot: Option<PathBuf>,
    pub session_id: Uuid,
    pub elapsed: Duration,
}

/// Renders URLs in a browser.
pub struct SessionManager {
    factory: Arc<dyn DriverFactory>,
    config: BrowserConfig,
    screenshots: Option<ScreenshotStore>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("screenshots", &self.screenshots)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(factory: Arc<dyn DriverFactory>, config: BrowserConfig) -> Self {
        let screenshots = config
            .screenshot
            .then(|| ScreenshotStore::new(config.screenshot_dir.clone()));
        Self {
            factory,
            config,
            screenshots,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Render `url` with a freshly acquired driver that is torn down
    /// afterwards, whatever the outcome.
    pub async fn render(&self, url: &str, chain: &HandlerChain) -> Result<RenderedPage> {
        let mut session = BrowserSession::new(url);
        let driver = match self.factory.create().await {
            Ok(driver) => driver,
            Err(error) => {
                tracing::error!(url, %error, "no browser session");
                return Err(acquire_error(error));
            }
        };
        session.attach(driver);

        let result = self.drive_timed(&mut session, chain).await;
        if result.is_err() {
            session.set_state(SessionState::Failed);
        }
        session.teardown().await;
        result
    }

    /// Render `url` with `worker`'s pooled driver. A successful render returns
    /// the driver to the pool; a failed one quits it.
    pub async fn render_pooled(
        &self,
        pool: &DriverPool,
        worker: WorkerId,
        url: &str,
        chain: &HandlerChain,
    ) -> Result<RenderedPage> {
        let mut session = BrowserSession::new(url);
        session.attach(pool.checkout(worker).await.map_err(acquire_error)?);

        let result = self.drive_timed(&mut session, chain).await;
        if result.is_ok() {
            if let Some(driver) = session.release() {
                pool.checkin(worker, driver).await;
            }
        } else {
            session.set_state(SessionState::Failed);
            session.teardown().await;
        }
        result
    }

    async fn drive_timed(&self, session: &mut BrowserSession, chain: &HandlerChain) -> Result<RenderedPage> {
        let budget = self.config.render_timeout();
        let started = Instant::now();
        let result = match time::timeout(budget, self.drive(session, chain)).await {
            Ok(result) => result,
            Err(_) => Err(Error::InteractionTimeout(budget)),
        };
        match result {
            Ok(mut page) => {
                page.elapsed = started.elapsed();
                tracing::info!(
                    url = %page.url,
                    handlers = ?page.handlers_run,
                    bytes = page.html.len(),
                    elapsed = ?page.elapsed,
                    "rendered page"
                );
                Ok(page)
            }
            Err(error) => {
                tracing::warn!(url = session.target_url(), %error, "render failed");
                Err(error)
            }
        }
    }

    async fn drive(&self, session: &mut BrowserSession, chain: &HandlerChain) -> Result<RenderedPage> {
        let url = session.target_url.clone();
        let Some(driver) = session.driver.as_deref_mut() else {
            return Err(Error::SessionAcquire("session has no driver".into()));
        };

        driver.navigate(&url).await.map_err(|error| match error {
            Error::Navigation { .. } => error,
            other => Error::Navigation {
                url: url.clone(),
                reason: other.to_string(),
            },
        })?;
        session.state = SessionState::Navigated;

        time::sleep(self.config.page_load_wait()).await;

        let screenshot = match &self.screenshots {
            Some(store) => capture(driver, store, &url).await,
            None => None,
        };

        session.state = SessionState::HandlerRunning;
        let output = chain.run(&url, driver).await?;

        let final_url = match driver.current_url().await {
            Ok(current) if !current.is_empty() => current,
            Ok(_) => url.clone(),
            Err(error) => {
                tracing::debug!(url, %error, "current url unavailable");
                url.clone()
            }
        };
        session.state = SessionState::Harvested;

        Ok(RenderedPage {
            url,
            final_url,
            html: output.html,
            handlers_run: output.handlers_run,
            screenshot,
            session_id: session.id,
            elapsed: Duration::ZERO,
        })
    }
}

async fn capture(driver: &mut dyn BrowserDriver, store: &ScreenshotStore, url: &str) -> Option<PathBuf> {
    let png = match driver.screenshot().await {
        Ok(png) => png,
        Err(error) => {
            tracing::warn!(url, %error, "screenshot failed");
            return None;
        }
    };
    match store.save(url, &png).await {
        Ok(path) => Some(path),
        Err(error) => {
            tracing::warn!(url, %error, "screenshot not saved");
            None
        }
    }
}

async fn quit_bounded(driver: &mut dyn BrowserDriver, session: Uuid) {
    match time::timeout(QUIT_TIMEOUT, driver.quit()).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(%session, %error, "driver quit failed"),
        Err(_) => tracing::warn!(%session, timeout = ?QUIT_TIMEOUT, "driver quit timed out, abandoning it"),
    }
}

fn acquire_error(error: Error) -> Error {
    match error {
        Error::SessionAcquire(_) => error,
        other => Error::SessionAcquire(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockDriver, MockFactory};
    use crate::interaction::{DefaultHandler, InteractionHandler};

    fn chain() -> HandlerChain {
        HandlerChain::new(vec![Arc::new(DefaultHandler) as Arc<dyn InteractionHandler>])
    }

    fn config() -> BrowserConfig {
        BrowserConfig {
            page_load_wait_secs: 0,
            ..BrowserConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_tears_down_once() {
        let factory = Arc::new(MockFactory::new(|| MockDriver::new().failing_navigation("dns")));
        let manager = SessionManager::new(factory.clone(), config());

        let result = manager.render("http://down.test/", &chain()).await;
        match result {
            Err(Error::Navigation { url, reason }) => {
                assert_eq!(url, "http://down.test/");
                assert!(reason.contains("dns"));
            }
            other => panic!("expected navigation error, got {other:?}"),
        }
        tokio::task::yield_now().await;
        assert_eq!(factory.counters(0).quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_render_harvests_and_tears_down() {
        let factory = Arc::new(MockFactory::new(|| MockDriver::new().with_body("<p>js</p>")));
        let manager = SessionManager::new(
            factory.clone(),
            BrowserConfig {
                page_load_wait_secs: 3,
                ..BrowserConfig::default()
            },
        );
        let page = manager.render("http://a.test/", &chain()).await.expect("page");
        assert_eq!(page.html, "<p>js</p>");
        assert_eq!(page.final_url, "http://a.test/");
        assert_eq!(page.handlers_run, vec!["DefaultHandler"]);
        assert_eq!(page.elapsed, Duration::from_secs(3));
        assert!(page.screenshot.is_none());
        assert_eq!(factory.counters(0).quits(), 1);
        assert_eq!(factory.counters(0).screenshots(), 0);
    }

    #[tokio::test]
    async fn screenshot_is_saved_and_failure_is_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shots = BrowserConfig {
            screenshot: true,
            screenshot_dir: dir.path().to_path_buf(),
            ..config()
        };

        let manager = SessionManager::new(Arc::new(MockFactory::new(MockDriver::new)), shots.clone());
        let page = manager.render("http://a.test/", &chain()).await.expect("page");
        let path = page.screenshot.expect("screenshot path");
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());

        let manager = SessionManager::new(
            Arc::new(MockFactory::new(|| {
                let mut driver = MockDriver::new();
                driver.fail_screenshot = true;
                driver
            })),
            shots,
        );
        let page = manager.render("http://a.test/", &chain()).await.expect("page");
        assert!(page.screenshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn render_budget_times_out() {
        let factory = Arc::new(MockFactory::new(|| {
            let mut driver = MockDriver::new();
            driver.navigate_delay = Some(Duration::from_secs(600));
            driver
        }));
        let manager = SessionManager::new(
            factory.clone(),
            BrowserConfig {
                render_timeout_secs: 5,
                ..config()
            },
        );
        let result = manager.render("http://slow.test/", &chain()).await;
        assert!(matches!(result, Err(Error::InteractionTimeout(d)) if d == Duration::from_secs(5)));
        assert_eq!(factory.counters(0).quits(), 1);
    }

    #[tokio::test]
    async fn acquire_failure_is_reported() {
        let manager = SessionManager::new(Arc::new(MockFactory::failing("no chrome")), config());
        let result = manager.render("http://a.test/", &chain()).await;
        assert!(matches!(result, Err(Error::SessionAcquire(_))));
    }

    #[tokio::test]
    async fn pooled_render_keeps_driver() {
        let factory = Arc::new(MockFactory::new(|| MockDriver::new().with_body("x")));
        let pool = DriverPool::new(factory.clone());
        let manager = SessionManager::new(factory.clone(), config());

        for _ in 0..2 {
            manager
                .render_pooled(&pool, WorkerId(0), "http://a.test/", &chain())
                .await
                .expect("page");
        }
        assert_eq!(factory.created(), 1);
        assert_eq!(factory.counters(0).quits(), 0);
        assert_eq!(factory.counters(0).navigations(), 2);
        pool.shutdown().await;
        assert_eq!(factory.counters(0).quits(), 1);
    }

    #[tokio::test]
    async fn dropped_session_schedules_teardown() {
        let driver = MockDriver::new();
        let counters = driver.counters.clone();
        let mut session = BrowserSession::new("http://a.test/");
        session.attach(Box::new(driver));
        assert_eq!(session.state(), SessionState::DriverAcquired);
        drop(session);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counters.quits(), 1);
    }

    #[tokio::test]
    async fn teardown_runs_once() {
        let driver = MockDriver::new();
        let counters = driver.counters.clone();
        let mut session = BrowserSession::new("http://a.test/");
        session.attach(Box::new(driver));
        session.teardown().await;
        session.teardown().await;
        drop(session);
        tokio::task::yield_now().await;
        assert_eq!(counters.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_quit_is_abandoned() {
        let mut driver = MockDriver::new();
        driver.quit_delay = Some(Duration::from_secs(3600));
        let counters = driver.counters.clone();
        let mut session = BrowserSession::new("http://a.test/");
        session.attach(Box::new(driver));

        let started = Instant::now();
        session.teardown().await;
        assert_eq!(started.elapsed(), QUIT_TIMEOUT);
        assert_eq!(session.state(), SessionState::TornDown);
        assert_eq!(counters.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn render_returns_despite_hung_quit() {
        let factory = Arc::new(MockFactory::new(|| {
            let mut driver = MockDriver::new().with_body("<p>ok</p>");
            driver.quit_delay = Some(Duration::from_secs(3600));
            driver
        }));
        let manager = SessionManager::new(factory.clone(), config());
        let page = manager.render("http://a.test/", &chain()).await.expect("page");
        assert_eq!(page.html, "<p>ok</p>");
        assert_eq!(factory.counters(0).quits(), 1);
    }
}
