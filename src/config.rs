//! Configuration for parsing, rule loading and browser rendering.
//!
//! Every struct has public fields and a `Default` carrying the documented
//! defaults. All of them deserialize with `#[serde(default)]`, so a JSON file
//! only needs to name the values it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use crate::rules::{DomainMatch, MatchPolicy};

/// Top-level configuration.
///
/// # Example
///
/// ```rust
/// use crawl_harvest::Config;
///
/// let config = Config::from_json_str(r#"{ "parser": { "backend": "streaming" } }"#)?;
/// assert_eq!(config.parser.default_encoding, "windows-1252");
/// # Ok::<(), crawl_harvest::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserConfig,
    pub rules: RuleConfig,
    pub browser: BrowserConfig,
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_json_str(&text)
    }

    /// Reject values that can never work at runtime.
    pub fn validate(&self) -> Result<()> {
        self.browser.validate()
    }
}

/// Settings for the parse pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// DOM backend used to build document trees.
    ///
    /// Default: `BackendKind::Normalizer`
    pub backend: BackendKind,

    /// Encoding label used when no other clue is found.
    ///
    /// An unknown label degrades to `windows-1252`.
    ///
    /// Default: `"windows-1252"`
    pub default_encoding: String,

    /// Hosts whose pages drop every outlink ending in `/#`.
    ///
    /// Matched as a substring of the parsed page's host.
    ///
    /// Default: empty
    pub strip_hash_link_hosts: Vec<String>,

    /// Write `fieldMeta` annotations for every evaluated rule.
    ///
    /// Default: `true`
    pub annotate_field_meta: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Normalizer,
            default_encoding: "windows-1252".to_string(),
            strip_hash_link_hosts: Vec::new(),
            annotate_field_meta: true,
        }
    }
}

/// Where extraction rules come from and how matches combine.
///
/// Sources are consulted in order `inline`, `file`, `plugin_file`; the first
/// one present wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Rule text given directly in configuration.
    ///
    /// Default: `None`
    pub inline: Option<String>,

    /// Rule file named by configuration.
    ///
    /// Default: `None`
    pub file: Option<PathBuf>,

    /// Rule file declared by the hosting plugin.
    ///
    /// Default: `None`
    pub plugin_file: Option<PathBuf>,

    /// What happens when several elements produce the same key.
    ///
    /// Default: `MatchPolicy::LastWins`
    pub match_policy: MatchPolicy,

    /// How a domain-scoped rule is matched against the base URL.
    ///
    /// Default: `DomainMatch::Substring`
    pub domain_match: DomainMatch,
}

/// Browser family for a locally launched driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserFamily {
    #[default]
    Chrome,
    Chromium,
    Edge,
}

impl BrowserFamily {
    /// Executable names searched on `PATH`, most specific first.
    #[must_use]
    pub fn executable_names(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            Self::Chromium => &["chromium", "chromium-browser"],
            Self::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4444
}

fn default_path() -> String {
    "/wd/hub".to_string()
}

/// How a browser driver is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DriverKind {
    /// Launch a browser on this machine.
    Local {
        #[serde(default)]
        browser: BrowserFamily,
        /// Explicit executable; searched on `PATH` when absent.
        #[serde(default)]
        binary: Option<PathBuf>,
    },
    /// Attach to a browser hub over the network.
    Remote {
        #[serde(default = "default_protocol")]
        protocol: String,
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_path")]
        path: String,
    },
}

impl Default for DriverKind {
    fn default() -> Self {
        Self::Local {
            browser: BrowserFamily::Chrome,
            binary: None,
        }
    }
}

impl DriverKind {
    /// A remote hub on `localhost:4444/wd/hub` over http.
    #[must_use]
    pub fn default_remote() -> Self {
        Self::Remote {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }

    /// Endpoint URL of a remote hub, `None` for local drivers.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        match self {
            Self::Local { .. } => None,
            Self::Remote {
                protocol,
                host,
                port,
                path,
            } => {
                let path = if path.starts_with('/') || path.is_empty() {
                    path.clone()
                } else {
                    format!("/{path}")
                };
                Some(format!("{protocol}://{host}:{port}{path}"))
            }
        }
    }
}

/// A host-specific interaction handler defined in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteHandlerConfig {
    /// Registry name used in [`BrowserConfig::handlers`].
    pub name: String,

    /// The handler applies to URLs containing this string.
    pub host_contains: String,

    /// Elements whose text must be populated before harvesting.
    #[serde(default)]
    pub item_selector: Option<String>,

    /// Wall-clock budget for the handler's interaction.
    #[serde(default = "default_site_wait_secs")]
    pub wait_timeout_secs: u64,
}

fn default_site_wait_secs() -> u64 {
    10
}

impl SiteHandlerConfig {
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Settings for browser rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct BrowserConfig {
    /// Local launch or remote hub.
    ///
    /// Default: local Chrome found on `PATH`
    pub driver: DriverKind,

    /// Run a local browser without a window.
    ///
    /// Default: `true`
    pub headless: bool,

    /// Extra command-line arguments for a local browser.
    ///
    /// Default: empty
    pub browser_args: Vec<String>,

    /// Seconds to wait after navigation before anything else happens.
    ///
    /// Default: `3`
    pub page_load_wait_secs: u64,

    /// Capture a screenshot after navigation.
    ///
    /// Default: `false`
    pub screenshot: bool,

    /// Directory screenshots are written to.
    ///
    /// Default: `"screenshots"`
    pub screenshot_dir: PathBuf,

    /// Comma-separated handler names, run in this order.
    ///
    /// Default: `"DefaultHandler"`
    pub handlers: String,

    /// Sleep between polling rounds, in milliseconds.
    ///
    /// Default: `1000`
    pub poll_interval_ms: u64,

    /// Maximum polling rounds before giving up on stability.
    ///
    /// Default: `10`
    pub max_rounds: u32,

    /// Wall-clock budget of the scroll handler, in seconds.
    ///
    /// Default: `60`
    pub scroll_timeout_secs: u64,

    /// Elements the scroll handler waits on after scrolling settles.
    ///
    /// Default: `None`
    pub item_selector: Option<String>,

    /// Host-specific handlers.
    ///
    /// Default: empty
    pub site_handlers: Vec<SiteHandlerConfig>,

    /// Budget for navigation plus all handlers for one URL, in seconds.
    ///
    /// Default: `120`
    pub render_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            headless: true,
            browser_args: Vec::new(),
            page_load_wait_secs: 3,
            screenshot: false,
            screenshot_dir: PathBuf::from("screenshots"),
            handlers: "DefaultHandler".to_string(),
            poll_interval_ms: 1000,
            max_rounds: 10,
            scroll_timeout_secs: 60,
            item_selector: None,
            site_handlers: Vec::new(),
            render_timeout_secs: 120,
        }
    }
}

impl BrowserConfig {
    #[must_use]
    pub fn page_load_wait(&self) -> Duration {
        Duration::from_secs(self.page_load_wait_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn scroll_timeout(&self) -> Duration {
        Duration::from_secs(self.scroll_timeout_secs)
    }

    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Handler names in configured order, blanks removed.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(Error::Config("browser.max_rounds must be at least 1".to_string()));
        }
        if self.render_timeout_secs == 0 {
            return Err(Error::Config(
                "browser.render_timeout_secs must be at least 1".to_string(),
            ));
        }
        if let DriverKind::Remote { port: 0, .. } = self.driver {
            return Err(Error::Config("remote driver port must not be 0".to_string()));
        }

        let selectors = self
            .item_selector
            .iter()
            .chain(self.site_handlers.iter().filter_map(|h| h.item_selector.as_ref()));
        for selector in selectors {
            if scraper::Selector::parse(selector).is_err() {
                return Err(Error::Config(format!("invalid item selector '{selector}'")));
            }
        }

        for (i, handler) in self.site_handlers.iter().enumerate() {
            if handler.name.trim().is_empty() || handler.host_contains.trim().is_empty() {
                return Err(Error::Config(format!(
                    "site handler #{i} needs a name and host_contains"
                )));
            }
            if self.site_handlers[..i].iter().any(|h| h.name == handler.name) {
                return Err(Error::Config(format!(
                    "duplicate site handler '{}'",
                    handler.name
                )));
            }
        }
        Ok(())
    }
}
