//! Result types for parse output.
//!
//! One [`ParseOutcome`] is produced per raw document, including documents
//! that failed to parse.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::BackendKind;
use crate::content::{MetaDirectives, Outlink};
use crate::encoding::ResolvedEncoding;
use crate::rules::FieldMap;

/// How parsing a document ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum ParseStatus {
    /// Parsed normally.
    Success,
    /// Parsed, and the page asks to be replaced by another URL.
    SuccessRedirect { target: String, delay_secs: u32 },
    /// Nothing could be extracted.
    Failed { reason: String },
}

/// Everything extracted from one raw document.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    /// URL of the raw document.
    pub url: String,

    pub status: ParseStatus,

    /// Encoding the bytes were decoded with; `None` only for failures before
    /// resolution.
    pub encoding: Option<ResolvedEncoding>,

    /// Backend that built the tree.
    pub backend: BackendKind,

    /// Document title; empty for `noindex` pages.
    pub title: Option<String>,

    /// Whitespace-normalized text; empty for `noindex` pages.
    pub text: String,

    /// Resolved links; empty for `nofollow` pages.
    pub outlinks: Vec<Outlink>,

    /// Robots, cache and refresh instructions.
    pub meta: MetaDirectives,

    /// Matches of field-scoped rules.
    pub fields: FieldMap,

    /// Matches of domain-scoped rules.
    pub tag_fields: FieldMap,

    /// Free-form parse metadata, e.g. `fieldMeta` flags per domain rule.
    pub parse_meta: BTreeMap<String, Vec<String>>,

    /// When the outcome was produced.
    pub parsed_at: DateTime<Utc>,
}

impl ParseOutcome {
    /// An empty outcome with `Success` status.
    #[must_use]
    pub fn new(url: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            url: url.into(),
            status: ParseStatus::Success,
            encoding: None,
            backend,
            title: None,
            text: String::new(),
            outlinks: Vec::new(),
            meta: MetaDirectives::default(),
            fields: FieldMap::default(),
            tag_fields: FieldMap::default(),
            parse_meta: BTreeMap::new(),
            parsed_at: Utc::now(),
        }
    }

    /// An outcome recording a failure.
    #[must_use]
    pub fn failed(url: impl Into<String>, backend: BackendKind, reason: impl Into<String>) -> Self {
        Self {
            status: ParseStatus::Failed {
                reason: reason.into(),
            },
            ..Self::new(url, backend)
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self.status, ParseStatus::Failed { .. })
    }

    /// Append a value under a parse-metadata key.
    pub fn add_parse_meta(&mut self, key: &str, value: impl Into<String>) {
        self.parse_meta
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }
}
