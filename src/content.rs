//! Text, title, links and meta directives read from a [`DocumentTree`].
//!
//! Everything here works on the backend-agnostic tree, so the result does not
//! depend on which DOM backend built it.

use serde::Serialize;
use url::Url;

use crate::patterns::{REFRESH_CONTENT, WHITESPACE};
use crate::tree::{DocumentTree, NodeData, NodeId};
use crate::url_utils;

/// Elements whose content never counts as document text.
const SKIPPED_TEXT_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Elements that separate words in extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "option", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements that carry a link and the attribute holding it.
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("frame", "src"),
    ("iframe", "src"),
    ("form", "action"),
];

/// A link found in the document, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outlink {
    pub url: String,
    pub anchor: String,
}

/// A `<meta http-equiv="refresh">` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Refresh {
    pub delay_secs: u32,
    /// Absolute target, `None` when the page refreshes itself.
    pub target: Option<String>,
}

/// Robots and cache instructions declared in the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetaDirectives {
    pub no_index: bool,
    pub no_follow: bool,
    pub no_cache: bool,
    pub refresh: Option<Refresh>,
}

/// Collapse whitespace runs to one space and trim.
#[must_use]
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Whitespace-normalized text of the whole document.
///
/// The `<head>`, scripts, styles and comments are skipped; block elements
/// separate words.
#[must_use]
pub fn text(tree: &DocumentTree) -> String {
    text_below(tree, tree.root())
}

/// Whitespace-normalized text below one node, with the same rules as [`text`].
#[must_use]
pub fn text_below(tree: &DocumentTree, id: NodeId) -> String {
    enum Step {
        Visit(NodeId),
        Break,
    }

    let mut raw = String::new();
    let mut stack = vec![Step::Visit(id)];
    while let Some(step) = stack.pop() {
        let Step::Visit(id) = step else {
            raw.push(' ');
            continue;
        };
        let node = tree.node(id);
        match &node.data {
            NodeData::Text(text) => raw.push_str(text),
            NodeData::Comment(_) => {}
            NodeData::Fragment => {
                stack.extend(node.children().iter().rev().map(|&c| Step::Visit(c)));
            }
            NodeData::Element { name, .. } => {
                if SKIPPED_TEXT_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name.as_str());
                if block {
                    raw.push(' ');
                    stack.push(Step::Break);
                }
                stack.extend(node.children().iter().rev().map(|&c| Step::Visit(c)));
            }
        }
    }
    normalize_whitespace(&raw)
}

/// Text of the first `<title>` outside inline SVG.
#[must_use]
pub fn title(tree: &DocumentTree) -> Option<String> {
    tree.elements_by_tag("title")
        .into_iter()
        .find(|&id| !tree.has_ancestor(id, "svg"))
        .map(|id| normalize_whitespace(&tree.text_content(id)))
        .filter(|title| !title.is_empty())
}

/// Effective base URL: `<base href>` resolved against `document_base`.
///
/// Falls back to `document_base` when there is no usable `<base>`.
#[must_use]
pub fn base_url(tree: &DocumentTree, document_base: &str) -> Option<Url> {
    let fallback = url_utils::parse_absolute(document_base);
    let declared = tree
        .elements_by_tag("base")
        .into_iter()
        .find_map(|id| tree.node(id).attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());

    match (declared, fallback) {
        (Some(href), Some(base)) => match base.join(href) {
            Ok(joined) => Some(joined),
            Err(_) => Some(base),
        },
        (Some(href), None) => url_utils::parse_absolute(href),
        (None, base) => base,
    }
}

/// All crawlable links in document order, deduplicated by URL.
///
/// Forms are only followed when they submit with `GET`.
#[must_use]
pub fn outlinks(tree: &DocumentTree, base: &Url) -> Vec<Outlink> {
    let mut links: Vec<Outlink> = Vec::new();
    for id in tree.descendants(tree.root()) {
        let node = tree.node(id);
        let Some(name) = node.tag_name() else {
            continue;
        };
        let Some(&(_, attr)) = LINK_SOURCES.iter().find(|(tag, _)| *tag == name) else {
            continue;
        };
        if name == "form"
            && node
                .attr("method")
                .is_some_and(|method| !method.trim().eq_ignore_ascii_case("get"))
        {
            continue;
        }
        let Some(url) = node
            .attr(attr)
            .and_then(|target| url_utils::resolve_link(target, base))
        else {
            continue;
        };

        let url = String::from(url);
        if links.iter().any(|link| link.url == url) {
            continue;
        }
        let anchor = match name {
            "a" => text_below(tree, id),
            "area" => node.attr("alt").map(normalize_whitespace).unwrap_or_default(),
            _ => String::new(),
        };
        links.push(Outlink { url, anchor });
    }
    links
}

/// Read robots, pragma and refresh `<meta>` tags.
#[must_use]
pub fn meta_directives(tree: &DocumentTree, base: Option<&Url>) -> MetaDirectives {
    let mut directives = MetaDirectives::default();

    for id in tree.elements_by_tag("meta") {
        let node = tree.node(id);
        let content = node.attr("content").unwrap_or_default();

        if node
            .attr("name")
            .is_some_and(|name| name.trim().eq_ignore_ascii_case("robots"))
        {
            for token in content.split(',').map(|t| t.trim().to_ascii_lowercase()) {
                match token.as_str() {
                    "none" => {
                        directives.no_index = true;
                        directives.no_follow = true;
                    }
                    "noindex" => directives.no_index = true,
                    "nofollow" => directives.no_follow = true,
                    "noarchive" | "nocache" => directives.no_cache = true,
                    _ => {}
                }
            }
            continue;
        }

        let Some(equiv) = node.attr("http-equiv").map(str::trim) else {
            continue;
        };
        if equiv.eq_ignore_ascii_case("pragma") {
            if content.trim().eq_ignore_ascii_case("no-cache") {
                directives.no_cache = true;
            }
        } else if equiv.eq_ignore_ascii_case("refresh") && directives.refresh.is_none() {
            directives.refresh = parse_refresh(content, base);
        }
    }
    directives
}

fn parse_refresh(content: &str, base: Option<&Url>) -> Option<Refresh> {
    let caps = REFRESH_CONTENT.captures(content)?;
    let delay_secs = caps[1].parse().unwrap_or(u32::MAX);
    let target = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
        .and_then(|t| match base {
            Some(base) => url_utils::resolve_link(t, base),
            None => url_utils::parse_absolute(t),
        })
        .map(String::from);
    Some(Refresh { delay_secs, target })
}

/// Drop every outlink ending in `/#` when the page at `page_url` is on one of
/// `hosts`. Returns how many were removed.
pub fn strip_hash_links(outlinks: &mut Vec<Outlink>, page_url: &str, hosts: &[String]) -> usize {
    let Some(page_host) = url_utils::host_of(page_url) else {
        return 0;
    };
    let listed = hosts.iter().any(|h| {
        let h = h.trim().to_ascii_lowercase();
        !h.is_empty() && page_host.contains(h.as_str())
    });
    if !listed {
        return 0;
    }
    let before = outlinks.len();
    outlinks.retain(|link| !url_utils::is_hash_directory_link(&link.url));
    before - outlinks.len()
}
