//! Chromium driver over the DevTools protocol (`chromiumoxide`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::Handler;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{BrowserDriver, DriverFactory};
use crate::config::{BrowserConfig, BrowserFamily, DriverKind};
use crate::error::{Error, Result};

/// Locate a browser binary: the configured path, then the family's usual
/// executable names on `PATH`.
#[must_use]
pub fn find_executable(family: BrowserFamily, binary: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = binary {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured browser binary not found");
    }
    family
        .executable_names()
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Launches a local browser or attaches to a remote one for every driver.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    config: BrowserConfig,
}

impl ChromiumFactory {
    #[must_use]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    async fn launch(&self, family: BrowserFamily, binary: Option<&Path>) -> Result<ChromiumDriver> {
        let executable = find_executable(family, binary).ok_or_else(|| {
            Error::SessionAcquire(format!("no {family:?} executable found on PATH"))
        })?;
        let profile_dir =
            std::env::temp_dir().join(format!("crawl-harvest-{}", uuid::Uuid::new_v4().simple()));

        let mut builder = LaunchConfig::builder()
            .chrome_executable(&executable)
            .user_data_dir(&profile_dir)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !self.config.headless {
            builder = builder.with_head();
        }
        for arg in &self.config.browser_args {
            builder = builder.arg(arg.as_str());
        }
        let launch = builder
            .build()
            .map_err(|e| Error::SessionAcquire(format!("invalid browser options: {e}")))?;

        let (browser, handler) = match Browser::launch(launch).await {
            Ok(pair) => pair,
            Err(e) => {
                remove_profile(&profile_dir).await;
                return Err(Error::SessionAcquire(format!(
                    "failed to launch {}: {e}",
                    executable.display()
                )));
            }
        };
        tracing::info!(executable = %executable.display(), headless = self.config.headless, "browser launched");
        ChromiumDriver::open(browser, handler, Some(profile_dir), false).await
    }

    async fn connect(&self, endpoint: String) -> Result<ChromiumDriver> {
        let (browser, handler) = Browser::connect(endpoint.clone())
            .await
            .map_err(|e| Error::SessionAcquire(format!("cannot reach {endpoint}: {e}")))?;
        tracing::info!(%endpoint, "attached to remote browser");
        ChromiumDriver::open(browser, handler, None, true).await
    }
}

#[async_trait]
impl DriverFactory for ChromiumFactory {
    async fn create(&self) -> Result<Box<dyn BrowserDriver>> {
        let driver = match &self.config.driver {
            DriverKind::Local { browser, binary } => self.launch(*browser, binary.as_deref()).await?,
            remote @ DriverKind::Remote { .. } => {
                let endpoint = remote
                    .endpoint()
                    .ok_or_else(|| Error::SessionAcquire("remote driver has no endpoint".into()))?;
                self.connect(endpoint).await?
            }
        };
        Ok(Box::new(driver))
    }
}

/// One page in a launched or attached browser.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
    profile_dir: Option<PathBuf>,
    remote: bool,
    closed: bool,
    healthy: bool,
}

impl ChromiumDriver {
    async fn open(
        mut browser: Browser,
        mut handler: Handler,
        profile_dir: Option<PathBuf>,
        remote: bool,
    ) -> Result<Self> {
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    tracing::trace!(%error, "devtools event error");
                }
            }
        });

        match browser.new_page("about:blank").await {
            Ok(page) => Ok(Self {
                browser,
                page,
                events,
                profile_dir,
                remote,
                closed: false,
                healthy: true,
            }),
            Err(e) => {
                if !remote {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                }
                events.abort();
                if let Some(dir) = &profile_dir {
                    remove_profile(dir).await;
                }
                Err(Error::SessionAcquire(format!("cannot open page: {e}")))
            }
        }
    }

    fn fail(&mut self, e: &CdpError) -> Error {
        let message = e.to_string();
        if message.contains("Execution context was destroyed")
            || message.contains("Cannot find context")
        {
            return Error::StaleReference;
        }
        self.healthy = false;
        Error::Driver(message)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let loaded = match self.page.goto(url).await {
            Ok(page) => page.wait_for_navigation().await.map(|_| ()),
            Err(e) => Err(e),
        };
        loaded.map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value> {
        match self.page.evaluate(script).await {
            Ok(result) => Ok(result.value().cloned().unwrap_or(Value::Null)),
            Err(e) => Err(self.fail(&e)),
        }
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| Error::Driver(format!("screenshot failed: {e}")))
    }

    async fn current_url(&mut self) -> Result<String> {
        match self.page.url().await {
            Ok(url) => Ok(url.unwrap_or_default()),
            Err(e) => Err(self.fail(&e)),
        }
    }

    async fn quit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.healthy = false;

        let mut failure = None;
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        if !self.remote {
            if let Err(e) = self.browser.close().await {
                failure = Some(Error::Driver(format!("browser close failed: {e}")));
            }
            if let Err(e) = self.browser.wait().await {
                tracing::debug!(error = %e, "waiting for browser exit failed");
            }
        }
        self.events.abort();
        if let Some(dir) = self.profile_dir.take() {
            remove_profile(&dir).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn is_healthy(&self) -> bool {
        self.healthy && !self.closed
    }
}

async fn remove_profile(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::trace!(path = %dir.display(), "removed browser profile"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dir.display(), error = %e, "browser profile not removed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configured_binary_falls_back_to_path() {
        let bogus = PathBuf::from("/nonexistent/chrome-binary");
        let found = find_executable(BrowserFamily::Chrome, Some(bogus.as_path()));
        assert_ne!(found.as_ref(), Some(&bogus));
    }

    #[tokio::test]
    async fn unreachable_remote_is_an_acquire_error() {
        let factory = ChromiumFactory::new(BrowserConfig {
            driver: DriverKind::Remote {
                protocol: "http".into(),
                host: "127.0.0.1".into(),
                port: 9,
                path: String::new(),
            },
            ..BrowserConfig::default()
        });
        assert!(matches!(factory.create().await, Err(Error::SessionAcquire(_))));
    }

    #[tokio::test]
    #[ignore = "requires a local Chrome or Chromium"]
    async fn renders_a_data_url() {
        let mut driver = ChromiumFactory::new(BrowserConfig::default())
            .create()
            .await
            .expect("browser");
        driver
            .navigate("data:text/html,<p id=x>hello</p>")
            .await
            .expect("navigate");
        assert_eq!(driver.body_html().await.expect("body"), "<p id=\"x\">hello</p>");
        driver.quit().await.expect("quit");
        driver.quit().await.expect("second quit");
    }
}
