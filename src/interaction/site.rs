use async_trait::async_trait;

use super::poll::PollPolicy;
use super::scroll::scroll_and_wait;
use super::InteractionHandler;
use crate::browser::BrowserDriver;
use crate::config::SiteHandlerConfig;
use crate::error::Result;

/// Scroll-and-wait interaction for one family of hosts, harvesting the full
/// page source.
#[derive(Debug, Clone)]
pub struct SiteHandler {
    name: String,
    host_contains: String,
    item_selector: Option<String>,
    policy: PollPolicy,
}

impl SiteHandler {
    /// `policy` supplies the poll interval and round limit; the timeout comes
    /// from the site's own `wait_timeout`.
    #[must_use]
    pub fn from_config(config: &SiteHandlerConfig, policy: PollPolicy) -> Self {
        Self {
            name: config.name.clone(),
            host_contains: config.host_contains.clone(),
            item_selector: config.item_selector.clone(),
            policy: policy.with_timeout(config.wait_timeout()),
        }
    }
}

#[async_trait]
impl InteractionHandler for SiteHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_process_url(&self, url: &str) -> bool {
        url.contains(&self.host_contains)
    }

    async fn process_driver(&self, driver: &mut dyn BrowserDriver) -> Result<String> {
        scroll_and_wait(driver, &self.policy, self.item_selector.as_deref()).await?;
        driver.page_source().await
    }
}
