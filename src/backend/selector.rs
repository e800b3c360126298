//! Selector-oriented backend: parses with `scraper` and adapts its node tree.

use scraper::{Html, Node};

use crate::tree::TreeBuilder;

/// Parse a full document with `scraper` and copy it node by node.
///
/// Doctypes and processing instructions are dropped. This backend cannot fail.
#[must_use]
pub fn build(html: &str) -> TreeBuilder {
    let document = Html::parse_document(html);

    let mut builder = TreeBuilder::new();
    let fragment = builder.root();
    let mut stack = vec![(document.tree.root(), fragment)];

    while let Some((node, parent)) = stack.pop() {
        let next_parent = match node.value() {
            Node::Document | Node::Fragment => parent,
            Node::Element(element) => builder.append_element(parent, element.name(), element.attrs()),
            Node::Text(text) => {
                builder.append_text(parent, text);
                continue;
            }
            Node::Comment(comment) => {
                builder.append_comment(parent, comment);
                continue;
            }
            _ => continue,
        };
        stack.extend(node.children().rev().map(|child| (child, next_parent)));
    }

    builder
}
