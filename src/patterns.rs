//! Compiled regex patterns shared across modules.
//!
//! All patterns are compiled once using `LazyLock`.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Text
// =============================================================================

/// Runs of whitespace, collapsed to one space in extracted text.
pub static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE regex"));

// =============================================================================
// Meta directives
// =============================================================================

/// `content` of a `http-equiv="refresh"` tag: delay, then an optional target
/// written as `url=...`, with or without quotes.
pub static REFRESH_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*(\d+)(?:\.\d*)?\s*(?:[;,]\s*(?:url\s*=\s*)?["']?([^"']*)["']?)?"#)
        .expect("REFRESH_CONTENT regex")
});

// =============================================================================
// Rules
// =============================================================================

/// Characters removed from a sub-selector to form its output key.
pub static SELECTOR_KEY_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\].]").expect("SELECTOR_KEY_STRIP regex"));
