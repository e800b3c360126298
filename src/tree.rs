//! Backend-agnostic document tree.
//!
//! Every DOM backend adapts its own node type into this arena so that text,
//! title, outlink and rule extraction never depend on which parser ran.
//! The root is always a fragment node; element and attribute names are
//! lowercase.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::encoding::ResolvedEncoding;

/// Index of a node inside its `DocumentTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Root of a parsed fragment.
    Fragment,
    /// An element with lowercase name and attributes in source order.
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// Character data.
    Text(String),
    /// A markup comment.
    Comment(String),
}

/// A node and its links.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Element name, `None` for non-elements.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Attribute value, `None` for non-elements or absent attributes.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        match &self.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// True for elements that never have children or an end tag.
#[must_use]
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// True for elements whose content is unescaped character data.
#[must_use]
pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Incremental constructor used by the DOM backends.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// Start a builder holding only the fragment root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Fragment,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// True when nothing was appended under the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Number of nodes directly under the root.
    #[must_use]
    pub fn top_level_len(&self) -> usize {
        self.nodes[0].children.len()
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append an element under `parent`, normalizing names to lowercase.
    pub fn append_element<N, I, K, V>(&mut self, parent: NodeId, name: N, attrs: I) -> NodeId
    where
        N: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut normalized: Vec<(String, String)> = Vec::new();
        for (k, v) in attrs {
            let key = k.as_ref().to_ascii_lowercase();
            // First occurrence wins, as in HTML tokenization.
            if !normalized.iter().any(|(existing, _)| *existing == key) {
                normalized.push((key, v.into()));
            }
        }
        self.push(
            parent,
            NodeData::Element {
                name: name.as_ref().to_ascii_lowercase(),
                attrs: normalized,
            },
        )
    }

    /// Append character data, merging with a preceding text sibling.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        self.push(parent, NodeData::Text(text.to_string()));
    }

    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::Comment(text.to_string()))
    }

    /// Move every top-level node of `other` under this builder's root.
    pub fn graft(&mut self, other: TreeBuilder) {
        let offset = self.nodes.len() - 1;
        let remap = |id: NodeId| {
            if id.0 == 0 {
                NodeId(0)
            } else {
                NodeId(id.0 + offset)
            }
        };

        let mut other_nodes = other.nodes.into_iter();
        let Some(other_root) = other_nodes.next() else {
            return;
        };
        for node in other_nodes {
            self.nodes.push(Node {
                data: node.data,
                parent: node.parent.map(remap),
                children: node.children.into_iter().map(remap).collect(),
            });
        }
        for child in other_root.children {
            self.nodes[0].children.push(remap(child));
        }
    }

    /// Seal the builder into a tree bound to one encoding and source URL.
    #[must_use]
    pub fn finish(self, encoding: ResolvedEncoding, url: impl Into<String>) -> DocumentTree {
        DocumentTree {
            nodes: self.nodes,
            encoding,
            url: url.into(),
            annotations: BTreeMap::new(),
        }
    }
}

/// A parsed document: an immutable node arena plus its provenance.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    encoding: ResolvedEncoding,
    url: String,
    annotations: BTreeMap<String, Vec<String>>,
}

impl DocumentTree {
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Access a node.
    ///
    /// Ids are only ever handed out by this tree, so indexing is in bounds.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree holds only its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Encoding the source bytes were decoded with.
    #[must_use]
    pub fn encoding(&self) -> &ResolvedEncoding {
        &self.encoding
    }

    /// URL of the raw document the tree came from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Append a metadata value under `key`. The node graph itself stays
    /// read-only.
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.entry(key.into()).or_default().push(value.into());
    }

    /// Values written under `key`, in write order.
    #[must_use]
    pub fn annotation(&self, key: &str) -> &[String] {
        self.annotations.get(key).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn annotations(&self) -> &BTreeMap<String, Vec<String>> {
        &self.annotations
    }

    /// Pre-order traversal of `id` and everything below it.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// All elements with the given tag name, in document order.
    #[must_use]
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .filter(|&id| {
                self.node(id)
                    .tag_name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            })
            .collect()
    }

    /// Whether any ancestor of `id` has the given tag name.
    #[must_use]
    pub fn has_ancestor(&self, id: NodeId, tag: &str) -> bool {
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            if self
                .node(parent)
                .tag_name()
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            {
                return true;
            }
            current = self.node(parent).parent;
        }
        false
    }

    /// Concatenated character data below `id`, comments excluded.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeData::Text(text) = &self.node(node).data {
                out.push_str(text);
            }
        }
        out
    }

    /// Serialize the whole tree back to markup.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &child in self.node(self.root()).children() {
            self.write_html(child, false, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match &self.node(id).data {
            NodeData::Fragment => {
                for &child in self.node(id).children() {
                    self.write_html(child, raw_text, out);
                }
            }
            NodeData::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeData::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if is_void_element(name) {
                    return;
                }
                let raw = is_raw_text_element(name);
                for &child in self.node(id).children() {
                    self.write_html(child, raw, out);
                }
                let _ = write!(out, "</{name}>");
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Pre-order iterator returned by [`DocumentTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a DocumentTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(id).children().iter().rev().copied());
        Some(id)
    }
}
