use async_trait::async_trait;

use super::InteractionHandler;
use crate::browser::BrowserDriver;
use crate::error::Result;

/// Harvests the body as loaded, without interacting.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

#[async_trait]
impl InteractionHandler for DefaultHandler {
    fn name(&self) -> &str {
        "DefaultHandler"
    }

    fn should_process_url(&self, _url: &str) -> bool {
        true
    }

    async fn process_driver(&self, driver: &mut dyn BrowserDriver) -> Result<String> {
        driver.body_html().await
    }
}
