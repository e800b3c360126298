use async_trait::async_trait;
use tokio::time::Instant;

use super::poll::{poll_until, poll_until_stable, PollPolicy, PollStatus};
use super::InteractionHandler;
use crate::browser::BrowserDriver;
use crate::error::Result;

/// Scrolls until the page stops growing, then optionally waits for lazily
/// filled items.
#[derive(Debug, Clone)]
pub struct ScrollHandler {
    policy: PollPolicy,
    item_selector: Option<String>,
}

impl ScrollHandler {
    #[must_use]
    pub fn new(policy: PollPolicy, item_selector: Option<String>) -> Self {
        Self {
            policy,
            item_selector,
        }
    }
}

#[async_trait]
impl InteractionHandler for ScrollHandler {
    fn name(&self) -> &str {
        "ScrollHandler"
    }

    fn should_process_url(&self, _url: &str) -> bool {
        true
    }

    async fn process_driver(&self, driver: &mut dyn BrowserDriver) -> Result<String> {
        scroll_and_wait(driver, &self.policy, self.item_selector.as_deref()).await?;
        driver.body_html().await
    }
}

/// Scroll to the bottom until the scroll height is stable, then wait until
/// every element matching `item_selector` has text.
///
/// Both phases share `policy.timeout`. Running out of time or rounds is
/// logged and the page is harvested as it is.
pub(super) async fn scroll_and_wait(
    driver: &mut dyn BrowserDriver,
    policy: &PollPolicy,
    item_selector: Option<&str>,
) -> Result<()> {
    let started = Instant::now();
    let scrolled = poll_until_stable::<i64, _>(driver, policy, |d| {
        Box::pin(async move {
            d.scroll_to_bottom().await?;
            d.scroll_height().await
        })
    })
    .await?;
    if scrolled.status != PollStatus::Stable {
        tracing::warn!(status = ?scrolled.status, rounds = scrolled.rounds, "scroll height never settled");
    }

    let Some(selector) = item_selector else {
        return Ok(());
    };
    let remaining = policy.with_timeout(policy.timeout.saturating_sub(started.elapsed()));
    let items = poll_until::<Vec<String>, _, _>(
        driver,
        &remaining,
        |d| {
            let selector = selector.to_string();
            Box::pin(async move { d.element_texts(&selector).await })
        },
        |_, texts: &Vec<String>| texts.iter().all(|t| !t.trim().is_empty()),
    )
    .await?;
    if items.status != PollStatus::Stable {
        tracing::warn!(
            selector,
            status = ?items.status,
            items = items.last.as_ref().map_or(0, Vec::len),
            "items still empty, harvesting partial content"
        );
    }
    Ok(())
}
