//! DOM Backend Selector
//!
//! Three interchangeable parsers turn decoded markup into the shared
//! [`DocumentTree`] shape:
//!
//! - [`BackendKind::Normalizer`]: html5ever tree construction through
//!   `dom_query`; tolerant of anything and always yields one balanced
//!   `<html>` fragment.
//! - [`BackendKind::Selector`]: the `scraper` document model, adapted node by
//!   node.
//! - [`BackendKind::Streaming`]: an event-driven reader that emits the
//!   document as a sequence of fragments and is drained until it returns an
//!   empty one.
//!
//! The backend is picked from configuration, never from request data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoding::{self, ResolvedEncoding};
use crate::error::{Error, Result};
use crate::tree::{DocumentTree, TreeBuilder};

pub mod normalizer;
pub mod selector;
pub mod streaming;

/// Which parser builds the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// html5ever normalization via `dom_query`.
    #[default]
    #[serde(alias = "neko")]
    Normalizer,
    /// `scraper` document adapted into the shared tree.
    #[serde(alias = "jsoup")]
    Selector,
    /// Incremental event reader, drained fragment by fragment.
    #[serde(alias = "tagsoup")]
    Streaming,
}

impl BackendKind {
    /// All backends, in a fixed order.
    pub const ALL: [BackendKind; 3] = [Self::Normalizer, Self::Selector, Self::Streaming];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalizer => "normalizer",
            Self::Selector => "selector",
            Self::Streaming => "streaming",
        }
    }

    /// Legacy configuration name accepted for this backend.
    #[must_use]
    pub fn legacy_alias(self) -> &'static str {
        match self {
            Self::Normalizer => "neko",
            Self::Selector => "jsoup",
            Self::Streaming => "tagsoup",
        }
    }

    /// Build a tree from already-decoded markup.
    pub fn build(self, html: &str) -> Result<TreeBuilder> {
        match self {
            Self::Normalizer => normalizer::build(html),
            Self::Selector => Ok(selector::build(html)),
            Self::Streaming => streaming::build(html),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(wanted)
                    || kind.legacy_alias().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| Error::Config(format!("unknown parser backend '{wanted}'")))
    }
}

/// Decode `bytes` under `encoding` and parse them with `backend`.
///
/// Ill-formed markup still produces a tree; only input the backend cannot
/// structurally recover from fails with [`Error::Parse`].
pub fn parse(
    bytes: &[u8],
    encoding: &ResolvedEncoding,
    backend: BackendKind,
    url: &str,
) -> Result<DocumentTree> {
    let html = encoding::decode(bytes, encoding);
    let builder = backend.build(&html)?;
    tracing::trace!(
        backend = %backend,
        url,
        top_level = builder.top_level_len(),
        "built document tree"
    );
    Ok(builder.finish(*encoding, url))
}
