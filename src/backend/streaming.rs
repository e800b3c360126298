//! Streaming backend: an event reader that hands the document out in
//! fragments.
//!
//! Each call to [`StreamingParser::next_fragment`] returns everything up to
//! and including the next complete top-level element. Callers keep asking
//! until an empty fragment comes back; stopping earlier loses the remainder
//! of the document.
//!
//! Leniency rules: end tags need not match, unclosed elements are closed at
//! end of input, void elements never take children, and `script`/`style`
//! bodies are copied verbatim. Markup the reader cannot tokenize at all (an
//! unterminated tag or comment) is a parse error.

use std::borrow::Cow;

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::tree::{is_raw_text_element, is_void_element, NodeId, TreeBuilder};

/// Incremental parser over one decoded document.
pub struct StreamingParser<'a> {
    input: Cow<'a, str>,
    offset: usize,
    done: bool,
}

fn reader_for(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Byte offset of `reader` inside the whole input.
fn absolute(base: usize, reader: &Reader<&[u8]>) -> usize {
    base + usize::try_from(reader.buffer_position()).unwrap_or(0)
}

impl<'a> StreamingParser<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input: escape_stray_lt(input),
            offset: 0,
            done: false,
        }
    }

    /// Read the next fragment. An empty builder means the input is exhausted.
    pub fn next_fragment(&mut self) -> Result<TreeBuilder> {
        let mut builder = TreeBuilder::new();
        if self.done {
            return Ok(builder);
        }

        let input: &str = &self.input;
        let mut base = self.offset;
        let mut reader = reader_for(&input[base..]);
        let mut open: Vec<(String, NodeId)> = Vec::new();
        loop {
            let parent = open.last().map_or(builder.root(), |(_, id)| *id);
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    return Err(Error::Parse(format!(
                        "{e} near byte {}",
                        absolute(base, &reader)
                    )));
                }
            };

            let self_closed = matches!(event, Event::Empty(_));
            let complete = match event {
                // HTML ignores the self-closing slash on non-void elements.
                Event::Start(tag) | Event::Empty(tag) => {
                    let name = tag_name(tag.name().as_ref());
                    let mut attrs = attributes(&tag);
                    if self_closed && slash_ends_unquoted_value(&tag) {
                        if let Some((_, value)) = attrs.last_mut() {
                            value.push('/');
                        }
                    }
                    let id = builder.append_element(parent, &name, attrs);
                    if is_raw_text_element(&name) {
                        base = copy_raw_text(input, absolute(base, &reader), &name, &mut builder, id);
                        reader = reader_for(&input[base..]);
                        open.is_empty()
                    } else if is_void_element(&name) {
                        open.is_empty()
                    } else {
                        open.push((name, id));
                        false
                    }
                }
                Event::End(tag) => {
                    let name = tag_name(tag.name().as_ref());
                    // Stray end tags are ignored; a match closes everything above it.
                    match open.iter().rposition(|(open_name, _)| *open_name == name) {
                        Some(pos) => {
                            open.truncate(pos);
                            open.is_empty()
                        }
                        None => false,
                    }
                }
                Event::Text(text) => {
                    builder.append_text(parent, &unescape(&String::from_utf8_lossy(&text)));
                    false
                }
                Event::CData(data) => {
                    builder.append_text(parent, &String::from_utf8_lossy(&data));
                    false
                }
                Event::Comment(comment) => {
                    builder.append_comment(parent, &String::from_utf8_lossy(&comment));
                    false
                }
                Event::Eof => {
                    self.done = true;
                    true
                }
                _ => false,
            };

            if complete {
                self.offset = absolute(base, &reader);
                return Ok(builder);
            }
        }
    }
}

/// Copy a `script`/`style` body starting at `start` verbatim and return the
/// offset just past its end tag. A missing end tag swallows the rest of the
/// input.
fn copy_raw_text(
    input: &str,
    start: usize,
    name: &str,
    builder: &mut TreeBuilder,
    parent: NodeId,
) -> usize {
    let rest = &input[start..];
    let close = format!("</{name}");

    let (body, resume) = match find_ignore_ascii_case(rest, &close) {
        Some(end) => {
            let after = rest[end..].find('>').map_or(rest.len(), |gt| end + gt + 1);
            (&rest[..end], start + after)
        }
        None => (rest, input.len()),
    };
    builder.append_text(parent, body);
    resume
}

/// Escape every `<` that cannot open markup (`1 < 2`) so the reader sees it
/// as text. Tags, comments and `script`/`style` bodies are left untouched.
fn escape_stray_lt(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let mut escaped: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1).copied() {
            Some(c) if c.is_ascii_alphabetic() => {
                let name_end = bytes[i + 1..]
                    .iter()
                    .position(|b| !b.is_ascii_alphanumeric())
                    .map_or(bytes.len(), |n| i + 1 + n);
                let name = input[i + 1..name_end].to_ascii_lowercase();
                i = tag_end(bytes, name_end);
                if is_raw_text_element(&name) {
                    let close = format!("</{name}");
                    i = find_ignore_ascii_case(&input[i..], &close).map_or(bytes.len(), |n| i + n);
                }
            }
            Some(b'!') if bytes[i..].starts_with(b"<!--") => {
                i = input[i + 4..].find("-->").map_or(bytes.len(), |n| i + 4 + n + 3);
            }
            Some(b'/' | b'!' | b'?') => i = tag_end(bytes, i + 1),
            _ => {
                let out = escaped.get_or_insert_with(|| String::with_capacity(input.len() + 8));
                out.push_str(&input[copied..i]);
                out.push_str("&lt;");
                i += 1;
                copied = i;
            }
        }
    }
    match escaped {
        Some(mut out) => {
            out.push_str(&input[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(input),
    }
}

/// Offset just past the `>` that closes a tag, skipping quoted values.
fn tag_end(bytes: &[u8], from: usize) -> usize {
    let mut quote = None;
    for (n, &b) in bytes[from..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return from + n + 1,
            None => {}
        }
    }
    bytes.len()
}

/// Whether the `/` the reader took as "self-closing" ends an unquoted value,
/// as in `<a href=/x/>`.
fn slash_ends_unquoted_value(tag: &BytesStart<'_>) -> bool {
    let Some(Ok(last)) = tag.html_attributes().last() else {
        return false;
    };
    let raw: &[u8] = tag;
    let raw = raw.trim_ascii_end();
    let value: &[u8] = &last.value;
    !value.is_empty()
        && raw.ends_with(value)
        && raw[..raw.len() - value.len()].trim_ascii_end().ends_with(b"=")
}

/// Drain a [`StreamingParser`] and graft every fragment into one tree.
pub fn build(html: &str) -> Result<TreeBuilder> {
    let mut parser = StreamingParser::new(html);
    let mut document = TreeBuilder::new();
    loop {
        let fragment = parser.next_fragment()?;
        if fragment.is_empty() {
            break;
        }
        document.graft(fragment);
    }
    Ok(document)
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn attributes(tag: &BytesStart<'_>) -> Vec<(String, String)> {
    tag.html_attributes()
        .filter_map(std::result::Result::ok)
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = unescape(&String::from_utf8_lossy(&attr.value));
            (key, value)
        })
        .collect()
}

/// Resolve HTML entities, keeping the raw text when a reference is malformed.
fn unescape(raw: &str) -> String {
    unescape_with(raw, resolve_html5_entity).map_or_else(|_| raw.to_string(), Cow::into_owned)
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
