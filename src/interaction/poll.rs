//! Bounded polling of a page signal.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{self, Instant};

use crate::browser::BrowserDriver;
use crate::config::BrowserConfig;
use crate::error::{Error, Result};

/// Limits for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two captures.
    pub interval: Duration,
    /// Maximum number of captures, including stale ones.
    pub max_rounds: u32,
    /// Wall-clock budget for the whole loop.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_rounds: 10,
            timeout: Duration::from_secs(60),
        }
    }
}

impl PollPolicy {
    #[must_use]
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_rounds: config.max_rounds,
            timeout: config.scroll_timeout(),
        }
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Why a polling loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The completion check passed.
    Stable,
    /// `max_rounds` captures were made without passing the check.
    RoundsExhausted,
    /// The wall-clock budget ran out.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    pub status: PollStatus,
    /// Captures attempted.
    pub rounds: u32,
    /// Last value successfully captured.
    pub last: Option<T>,
    pub elapsed: Duration,
}

impl<T> PollOutcome<T> {
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.status == PollStatus::Stable
    }
}

/// Capture a signal until two consecutive captures are equal.
pub async fn poll_until_stable<T, F>(
    driver: &mut dyn BrowserDriver,
    policy: &PollPolicy,
    capture: F,
) -> Result<PollOutcome<T>>
where
    T: PartialEq + Send,
    F: for<'d> FnMut(&'d mut dyn BrowserDriver) -> BoxFuture<'d, Result<T>> + Send,
{
    poll_until(driver, policy, capture, |previous, current| {
        previous == Some(current)
    })
    .await
}

/// Capture a signal until `done(previous, current)` holds.
///
/// A capture failing with [`Error::StaleReference`] is retried at once without
/// sleeping; it still counts as a round. Other capture errors end the loop.
/// No sleep follows the final round.
pub async fn poll_until<T, F, D>(
    driver: &mut dyn BrowserDriver,
    policy: &PollPolicy,
    mut capture: F,
    mut done: D,
) -> Result<PollOutcome<T>>
where
    T: Send,
    F: for<'d> FnMut(&'d mut dyn BrowserDriver) -> BoxFuture<'d, Result<T>> + Send,
    D: FnMut(Option<&T>, &T) -> bool + Send,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut last: Option<T> = None;
    let mut rounds = 0;

    let status = loop {
        if rounds >= policy.max_rounds {
            break PollStatus::RoundsExhausted;
        }
        rounds += 1;

        let captured = match time::timeout_at(deadline, capture(&mut *driver)).await {
            Ok(captured) => captured,
            Err(_) => break PollStatus::TimedOut,
        };
        let current = match captured {
            Ok(value) => value,
            Err(Error::StaleReference) => {
                tracing::debug!(round = rounds, "stale capture, retrying");
                continue;
            }
            Err(error) => return Err(error),
        };

        let finished = done(last.as_ref(), &current);
        last = Some(current);
        if finished {
            break PollStatus::Stable;
        }
        if rounds >= policy.max_rounds {
            break PollStatus::RoundsExhausted;
        }
        if time::timeout_at(deadline, time::sleep(policy.interval))
            .await
            .is_err()
        {
            break PollStatus::TimedOut;
        }
    };

    let elapsed = started.elapsed();
    tracing::trace!(?status, rounds, ?elapsed, "polling finished");
    Ok(PollOutcome {
        status,
        rounds,
        last,
        elapsed,
    })
}
