//! Browser Session Manager
//!
//! Drives a real browser to render JavaScript-heavy pages. The browser is
//! abstracted behind [`BrowserDriver`] and obtained from a [`DriverFactory`];
//! the chromium implementation lives behind the `chromium` feature.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod pool;
pub mod screenshot;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use pool::{DriverPool, WorkerId};
pub use screenshot::ScreenshotStore;
pub use session::{BrowserSession, RenderedPage, SessionManager, SessionState};

/// Expression yielding the scroll height of the page body.
const SCROLL_HEIGHT_JS: &str = "document.body ? document.body.scrollHeight : 0";
const SCROLL_TO_BOTTOM_JS: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0)";
const BODY_HTML_JS: &str = "document.body ? document.body.innerHTML : ''";
const PAGE_SOURCE_JS: &str = "document.documentElement.outerHTML";

/// One live browser page.
///
/// A driver is owned by a single task at a time. Script-based operations have
/// default implementations on top of [`BrowserDriver::execute_script`].
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load `url` and wait for the navigation to finish.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Evaluate a JavaScript expression; `undefined` becomes `Value::Null`.
    async fn execute_script(&mut self, script: &str) -> Result<Value>;

    /// Capture the viewport as PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// URL the page currently shows.
    async fn current_url(&mut self) -> Result<String>;

    /// Close the browser and release its resources. Calling it twice is a
    /// no-op.
    async fn quit(&mut self) -> Result<()>;

    /// Whether the driver can be reused for another page.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Inner HTML of `<body>`.
    async fn body_html(&mut self) -> Result<String> {
        let value = self.execute_script(BODY_HTML_JS).await?;
        string_value(value, "body html")
    }

    /// Serialized markup of the whole document.
    async fn page_source(&mut self) -> Result<String> {
        let value = self.execute_script(PAGE_SOURCE_JS).await?;
        string_value(value, "page source")
    }

    /// Text content of every element matching a CSS selector.
    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>> {
        let literal = serde_json::to_string(selector)
            .map_err(|e| Error::Driver(format!("cannot quote selector: {e}")))?;
        let script = format!(
            "Array.from(document.querySelectorAll({literal})).map(e => e.textContent || '')"
        );
        let value = self.execute_script(&script).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Driver(format!("unexpected element texts: {e}")))
    }

    /// Current scroll height of the body.
    async fn scroll_height(&mut self) -> Result<i64> {
        let value = self.execute_script(SCROLL_HEIGHT_JS).await?;
        #[allow(clippy::cast_possible_truncation)]
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|v| v.round() as i64))
            .ok_or_else(|| Error::Driver(format!("unexpected scroll height: {value}")))
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.execute_script(SCROLL_TO_BOTTOM_JS).await.map(|_| ())
    }
}

fn string_value(value: Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Err(Error::Driver(format!("unexpected {what}: {other}"))),
    }
}

/// Creates drivers on demand.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Start or attach to a browser. Failures are `Error::SessionAcquire`.
    async fn create(&self) -> Result<Box<dyn BrowserDriver>>;
}
