//! Error types for crawl-harvest.
//!
//! Parsing, rule loading and browser rendering all report through this enum.
//! Encoding ambiguity and per-element rule mismatches are never errors.

/// Error type for parse, rule and render operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The selected DOM backend could not build a tree from the input.
    #[error("HTML parsing failed: {0}")]
    Parse(String),

    /// A rule line was rejected; the whole scope is dropped.
    #[error("invalid rule for scope '{scope}': {reason}")]
    RuleLoad {
        /// Domain substring or field name the rule was registered under.
        scope: String,
        /// What was wrong with the line.
        reason: String,
    },

    /// The rule configuration resource could not be read.
    #[error("rule source unavailable: {0}")]
    RuleSource(String),

    /// No browser driver could be acquired for the render attempt.
    #[error("browser session could not be acquired: {0}")]
    SessionAcquire(String),

    /// The driver failed to load the target URL.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Driver-reported cause.
        reason: String,
    },

    /// A driver command failed after navigation.
    #[error("browser driver error: {0}")]
    Driver(String),

    /// An element handle went stale because the page re-rendered.
    #[error("element reference is stale")]
    StaleReference,

    /// A time-bounded interaction ran out of time.
    #[error("interaction timed out after {0:?}")]
    InteractionTimeout(std::time::Duration),

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem failure (screenshots, rule files, temp profiles).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for conditions the interaction layer recovers from locally.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StaleReference | Self::InteractionTimeout(_))
    }
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
