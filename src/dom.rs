//! DOM Operations Adapter
//!
//! Thin helpers over `dom_query` used by the rule engine. Selectors that fail
//! to parse select nothing instead of panicking.

pub use dom_query::{Document, NodeRef, Selection};

use crate::content::normalize_whitespace;

/// Parse markup into a queryable document.
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

/// All elements of `doc` matching `selector`, in document order.
#[must_use]
pub fn select_all<'a>(doc: &'a Document, selector: &str) -> Vec<NodeRef<'a>> {
    doc.try_select(selector)
        .map(|sel| sel.nodes().to_vec())
        .unwrap_or_default()
}

/// Descendants of `node` matching `selector`.
#[must_use]
pub fn select_within<'a>(node: &NodeRef<'a>, selector: &str) -> Vec<NodeRef<'a>> {
    Selection::from(*node)
        .try_select(selector)
        .map(|sel| sel.nodes().to_vec())
        .unwrap_or_default()
}

/// Attribute value of one element.
#[inline]
#[must_use]
pub fn attribute(node: &NodeRef, name: &str) -> Option<String> {
    node.attr(name).map(|value| value.to_string())
}

/// Value of `name` on the first element that carries it.
#[must_use]
pub fn first_attribute(nodes: &[NodeRef], name: &str) -> Option<String> {
    nodes.iter().find_map(|node| attribute(node, name))
}

/// Text of every element, each whitespace-normalized, joined by one space.
#[must_use]
pub fn joined_text(nodes: &[NodeRef]) -> String {
    nodes
        .iter()
        .map(|node| normalize_whitespace(&node.text()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
