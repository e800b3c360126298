//! # crawl-harvest
//!
//! Parse-side extensions for a web crawler: turn fetched bytes into a
//! document tree, pull text, outlinks and rule-defined fields out of it, and
//! render JavaScript-heavy pages in a real browser when the raw bytes are not
//! enough.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use crawl_harvest::{HtmlParser, MatchOptions, ParserConfig, RawDocument, RuleSource, RuleStore};
//!
//! let rules = Arc::new(RuleStore::new());
//! rules.load(&RuleSource::Inline(
//!     "shop.example\tdiv.price\tdata-value\t*\t.amount:*".to_string(),
//! ))?;
//! let parser = HtmlParser::new(ParserConfig::default(), rules, MatchOptions::default());
//!
//! let doc = RawDocument::new(
//!     "http://shop.example/item",
//!     r#"<div class="price" data-value="x"><span class="amount">42</span></div>"#,
//! );
//! let outcome = parser.parse(&doc);
//! assert!(outcome.is_success());
//! assert_eq!(outcome.tag_fields.get("x").map(|m| m.sub_outputs.clone()),
//!            Some(vec![Some("amount:42".to_string())]));
//! # Ok::<(), crawl_harvest::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Encoding resolution**: header, `<meta>` and byte-order-mark signals
//!   ranked into one charset
//! - **Pluggable DOM backends**: normalizing, selector-library and streaming
//!   tree builders behind [`BackendKind`]
//! - **Extraction rules**: tab-separated domain and field rules evaluated with
//!   CSS selectors and value patterns
//! - **Browser rendering**: sessions, per-worker driver pools and an ordered
//!   chain of interaction handlers (`chromium` feature for the real driver)

mod error;
mod patterns;

/// Charset signals and decoding.
pub mod encoding;

/// Fetched document input.
pub mod document;

/// Backend-neutral document tree.
pub mod tree;

/// DOM backend selection and the three tree builders.
pub mod backend;

/// Text, title, outlink and robots extraction from a tree.
pub mod content;

/// CSS-selector helpers used by rule evaluation.
pub mod dom;

/// URL parsing and link resolution.
pub mod url_utils;

/// Extraction rule loading and evaluation.
pub mod rules;

/// Parser, rule and browser settings.
pub mod config;

/// Parse outcome types.
pub mod result;

/// The parse pipeline.
pub mod parser;

/// Browser sessions, drivers and pooling.
pub mod browser;

/// Page interaction handlers.
pub mod interaction;

// Public API - re-exports
pub use backend::BackendKind;
pub use browser::{
    BrowserDriver, BrowserSession, DriverFactory, DriverPool, RenderedPage, ScreenshotStore,
    SessionManager, SessionState, WorkerId,
};
pub use config::{BrowserConfig, Config, DriverKind, ParserConfig, RuleConfig, SiteHandlerConfig};
pub use content::{MetaDirectives, Outlink};
pub use document::RawDocument;
pub use encoding::{EncodingSource, ResolvedEncoding};
pub use error::{Error, Result};
pub use interaction::{
    ChainOutput, HandlerChain, HandlerRegistry, InteractionHandler, PollPolicy, PollStatus,
};
pub use parser::HtmlParser;
pub use result::{ParseOutcome, ParseStatus};
pub use rules::{
    FieldMap, FieldMatch, LoadedRules, MatchOptions, MatchPolicy, RuleSource, RuleStore, RuleTable,
};
pub use tree::DocumentTree;

#[cfg(feature = "chromium")]
pub use browser::chromium::{ChromiumDriver, ChromiumFactory};
