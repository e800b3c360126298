//! Normalizing backend built on `dom_query` (html5ever tree construction).
//!
//! Unclosed tags, misnested formatting and stray end tags are repaired by the
//! HTML tree-construction algorithm, so this backend never rejects input.

use dom_query::{Document, NodeData, NodeRef};

use crate::error::{Error, Result};
use crate::tree::{NodeId, TreeBuilder};

/// Parse markup and copy the balanced `<html>` element into a fragment.
pub fn build(html: &str) -> Result<TreeBuilder> {
    let document = Document::from(html);
    let root = document.select("html");
    let Some(html_node) = root.nodes().first().copied() else {
        return Err(Error::Parse("normalizer produced no <html> element".to_string()));
    };

    let mut builder = TreeBuilder::new();
    let fragment = builder.root();
    let mut stack: Vec<(NodeRef, NodeId)> = vec![(html_node, fragment)];

    while let Some((node, parent)) = stack.pop() {
        if node.is_element() {
            let name = node.node_name().map(|n| n.to_string()).unwrap_or_default();
            let attrs: Vec<(String, String)> = node
                .attrs()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            let id = builder.append_element(parent, name, attrs);
            for child in node.children().into_iter().rev() {
                stack.push((child, id));
            }
        } else if node.is_text() {
            builder.append_text(parent, &node.text());
        } else if let Some(comment) = comment_text(&node) {
            builder.append_comment(parent, &comment);
        }
    }

    Ok(builder)
}

fn comment_text(node: &NodeRef) -> Option<String> {
    node.query(|inner| match &inner.data {
        NodeData::Comment { contents } => Some(contents.to_string()),
        _ => None,
    })
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_unclosed_tags() {
        let builder = build("<div><p>one<p>two</div>").expect("build");
        assert_eq!(builder.top_level_len(), 1);
        let html = builder
            .finish(
                crate::encoding::ResolvedEncoding::new(
                    encoding_rs::UTF_8,
                    crate::encoding::EncodingSource::ConfiguredDefault,
                ),
                "",
            )
            .to_html();
        assert_eq!(
            html,
            "<html><head></head><body><div><p>one</p><p>two</p></div></body></html>"
        );
    }

    #[test]
    fn empty_input_still_yields_skeleton() {
        let builder = build("").expect("build");
        assert_eq!(builder.top_level_len(), 1);
    }

    #[test]
    fn comments_are_kept() {
        let tree = build("<body><p>a<!--note-->b</p></body>")
            .expect("build")
            .finish(
                crate::encoding::ResolvedEncoding::new(
                    encoding_rs::UTF_8,
                    crate::encoding::EncodingSource::ConfiguredDefault,
                ),
                "",
            );
        assert!(tree.to_html().contains("<p>a<!--note-->b</p>"));
    }
}
