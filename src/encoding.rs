//! Character encoding resolution and transcoding.
//!
//! Fetched pages arrive as bytes with a handful of possibly contradictory
//! charset signals: the transport `Content-Type` header, an HTML5
//! `<meta charset>` tag, a legacy `<meta http-equiv="Content-Type">` tag and a
//! byte-order mark. This module ranks those signals and decodes the bytes.

use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use regex::Regex;
use serde::Serialize;

/// Number of leading bytes inspected for meta declarations.
///
/// Some documents declare their charset well past the first kilobyte, so the
/// scan window is 8 KiB.
pub const CHUNK_SIZE: usize = 8192;

/// Match an HTML5 `<meta charset="...">` attribute, in any attribute position
#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s+(?:[a-z_:-]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+)\s+)*charset\s*=\s*["']?([a-z0-9][a-z0-9_\-:.]*)"#,
    )
    .expect("valid regex")
});

/// Match a `<meta>` tag carrying `http-equiv="Content-Type"`
#[allow(clippy::expect_used)]
static META_HTTP_EQUIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+([^>]*http-equiv\s*=\s*["']?content-type["']?[^>]*)>"#)
        .expect("valid regex")
});

/// Match a `charset=` parameter inside a content-type value
#[allow(clippy::expect_used)]
static CHARSET_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([a-z0-9][a-z0-9_\-:.]*)"#).expect("valid regex")
});

/// Where a resolved encoding came from, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingSource {
    /// `charset` parameter of the transport `Content-Type` header.
    DeclaredHeader,
    /// HTML5 `<meta charset>`.
    MetaCharset,
    /// Legacy `<meta http-equiv="Content-Type" content="...; charset=...">`.
    MetaHttpEquiv,
    /// UTF-8 / UTF-16 byte-order mark.
    ByteOrderMark,
    /// Nothing usable was found.
    ConfiguredDefault,
}

/// A single charset signal with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingClue {
    /// Raw charset label as found (e.g. `"ISO-8859-1"`).
    pub label: String,
    /// Origin of the label; decides precedence.
    pub source: EncodingSource,
}

impl EncodingClue {
    #[must_use]
    pub fn new(label: impl Into<String>, source: EncodingSource) -> Self {
        Self {
            label: label.into(),
            source,
        }
    }
}

/// The encoding chosen for a document and the signal that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedEncoding {
    /// Canonical WHATWG name (e.g. `"UTF-8"`, `"windows-1252"`).
    pub name: &'static str,
    /// Signal that won.
    pub source: EncodingSource,
    #[serde(skip)]
    encoding: &'static Encoding,
}

impl ResolvedEncoding {
    #[must_use]
    pub fn new(encoding: &'static Encoding, source: EncodingSource) -> Self {
        Self {
            name: encoding.name(),
            source,
            encoding,
        }
    }

    /// The underlying `encoding_rs` encoding.
    #[must_use]
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Encode text back into bytes under this encoding.
    ///
    /// A byte-order mark is written when the encoding was itself resolved
    /// from one, so re-resolving the output yields the same result.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let with_bom = self.source == EncodingSource::ByteOrderMark;
        if self.encoding == UTF_16LE || self.encoding == UTF_16BE {
            let little = self.encoding == UTF_16LE;
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if with_bom {
                let bom: [u8; 2] = if little { [0xFF, 0xFE] } else { [0xFE, 0xFF] };
                out.extend_from_slice(&bom);
            }
            for unit in text.encode_utf16() {
                let bytes = if little {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                };
                out.extend_from_slice(&bytes);
            }
            return out;
        }

        let (bytes, _, _) = self.encoding.encode(text);
        if with_bom && self.encoding == UTF_8 {
            let mut out = Vec::with_capacity(bytes.len() + 3);
            out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
            out.extend_from_slice(&bytes);
            return out;
        }
        bytes.into_owned()
    }
}

/// Resolve the encoding of `bytes`.
///
/// `declared_content_type` is the transport `Content-Type` value, if any.
/// Precedence: header charset, HTML5 meta charset, legacy meta http-equiv,
/// byte-order mark, then `configured_default`. Unknown labels fall through to
/// the next candidate; an unknown default falls back to `windows-1252`.
#[must_use]
pub fn resolve(
    bytes: &[u8],
    declared_content_type: Option<&str>,
    configured_default: &str,
) -> ResolvedEncoding {
    let mut clues = Vec::new();
    if let Some(charset) = declared_content_type.and_then(charset_from_content_type) {
        clues.push(EncodingClue::new(charset, EncodingSource::DeclaredHeader));
    }
    resolve_with_clues(bytes, &clues, configured_default)
}

/// Resolve the encoding using externally supplied clues plus sniffed ones.
///
/// Clues found by sniffing `bytes` are merged with `clues`; the best-ranked
/// clue whose label `encoding_rs` recognises wins.
#[must_use]
pub fn resolve_with_clues(
    bytes: &[u8],
    clues: &[EncodingClue],
    configured_default: &str,
) -> ResolvedEncoding {
    let mut candidates: Vec<EncodingClue> = clues.to_vec();
    candidates.extend(sniff(bytes));
    // Stable: clues of equal rank keep the caller's order.
    candidates.sort_by_key(|c| c.source);

    for clue in &candidates {
        if let Some(encoding) = lookup(&clue.label, clue.source) {
            return ResolvedEncoding::new(encoding, clue.source);
        }
        tracing::debug!(
            label = %clue.label,
            source = ?clue.source,
            "ignoring unrecognised charset label"
        );
    }

    let fallback = Encoding::for_label(configured_default.trim().as_bytes()).unwrap_or_else(|| {
        tracing::warn!(
            default = configured_default,
            "configured default encoding is unknown, using windows-1252"
        );
        WINDOWS_1252
    });
    ResolvedEncoding::new(fallback, EncodingSource::ConfiguredDefault)
}

/// Collect every charset signal present in the first `CHUNK_SIZE` bytes.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Vec<EncodingClue> {
    let head = &bytes[..bytes.len().min(CHUNK_SIZE)];
    // Only ASCII matters for the meta search; lossy conversion keeps offsets sane.
    let head_str = String::from_utf8_lossy(head);

    let mut clues = Vec::new();
    if let Some(label) = extract_meta_charset(&head_str) {
        clues.push(EncodingClue::new(label, EncodingSource::MetaCharset));
    }
    if let Some(label) = extract_http_equiv_charset(&head_str) {
        clues.push(EncodingClue::new(label, EncodingSource::MetaHttpEquiv));
    }
    if let Some(label) = sniff_bom(bytes) {
        clues.push(EncodingClue::new(label, EncodingSource::ByteOrderMark));
    }
    clues
}

/// Decode bytes under `resolved`, replacing malformed sequences with U+FFFD.
///
/// A byte-order mark matching the encoding is stripped.
#[must_use]
pub fn decode(bytes: &[u8], resolved: &ResolvedEncoding) -> String {
    if resolved.encoding == UTF_8 {
        let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        return String::from_utf8_lossy(body).into_owned();
    }
    let (decoded, _had_errors) = resolved.encoding.decode_with_bom_removal(bytes);
    decoded.into_owned()
}

/// Extract the `charset` parameter from a `Content-Type` value.
#[must_use]
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    CHARSET_PARAM_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn lookup(label: &str, source: EncodingSource) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    if encoding == encoding_rs::REPLACEMENT {
        return None;
    }
    // An ASCII-readable meta tag cannot be describing UTF-16 bytes.
    if matches!(source, EncodingSource::MetaCharset | EncodingSource::MetaHttpEquiv)
        && (encoding == UTF_16LE || encoding == UTF_16BE)
    {
        return Some(UTF_8);
    }
    Some(encoding)
}

/// Extract charset from `<meta charset="...">`.
fn extract_meta_charset(html: &str) -> Option<String> {
    META_CHARSET_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract charset from `<meta http-equiv="Content-Type" content="...; charset=...">`.
fn extract_http_equiv_charset(html: &str) -> Option<String> {
    let tag = META_HTTP_EQUIV_RE.captures(html)?.get(1)?;
    charset_from_content_type(tag.as_str())
}

fn sniff_bom(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => Some("UTF-8"),
        [0xFF, 0xFE, ..] => Some("UTF-16LE"),
        [0xFE, 0xFF, ..] => Some("UTF-16BE"),
        _ => None,
    }
}
