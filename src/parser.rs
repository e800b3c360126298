//! Parse pipeline: raw document to [`ParseOutcome`].
//!
//! Encoding resolution, tree construction, content extraction and rule
//! evaluation run in that order. A failure in one document never affects
//! another; it is reported through [`ParseStatus::Failed`].

use std::sync::Arc;

use crate::backend::{self, BackendKind};
use crate::config::{Config, ParserConfig};
use crate::content;
use crate::document::RawDocument;
use crate::encoding;
use crate::result::{ParseOutcome, ParseStatus};
use crate::rules::{self, MatchOptions, RuleInput, RuleStore};

/// Content type given to markup harvested from a browser.
pub const RENDERED_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Parse-metadata key holding one `true`/`false` flag per domain rule.
pub const FIELD_META_KEY: &str = "fieldMeta";

/// Turns raw documents into parse outcomes.
///
/// Cheap to clone; clones share the rule store.
#[derive(Debug, Clone)]
pub struct HtmlParser {
    config: ParserConfig,
    rules: Arc<RuleStore>,
    match_options: MatchOptions,
}

impl HtmlParser {
    /// Build a parser around an existing rule store.
    #[must_use]
    pub fn new(config: ParserConfig, rules: Arc<RuleStore>, match_options: MatchOptions) -> Self {
        Self {
            config,
            rules,
            match_options,
        }
    }

    /// Build a parser and load its rules from configuration.
    ///
    /// A rule source that cannot be read is logged and leaves the parser
    /// without rules.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(RuleStore::new());
        match store.load_config(&config.rules) {
            Ok(loaded) if !loaded.errors.is_empty() => {
                tracing::warn!(rejected = loaded.errors.len(), "some rule scopes were rejected");
            }
            Ok(_) => {}
            Err(error) => tracing::error!(%error, "extraction rules unavailable"),
        }
        Self::new(
            config.parser.clone(),
            store,
            MatchOptions::from(&config.rules),
        )
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.config.backend
    }

    #[must_use]
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// Parse one document.
    pub fn parse(&self, doc: &RawDocument) -> ParseOutcome {
        let backend = self.config.backend;
        let mut outcome = ParseOutcome::new(&doc.url, backend);

        let resolved = encoding::resolve(
            &doc.bytes,
            doc.declared_content_type(),
            &self.config.default_encoding,
        );
        outcome.encoding = Some(resolved);

        let mut tree = match backend::parse(&doc.bytes, &resolved, backend, &doc.url) {
            Ok(tree) => tree,
            Err(error) => {
                tracing::warn!(url = %doc.url, %backend, %error, "document failed to parse");
                outcome.status = ParseStatus::Failed {
                    reason: error.to_string(),
                };
                return outcome;
            }
        };

        let base = content::base_url(&tree, &doc.base_url);
        outcome.meta = content::meta_directives(&tree, base.as_ref());

        if !outcome.meta.no_index {
            outcome.title = content::title(&tree);
            outcome.text = content::text(&tree);
        }
        if !outcome.meta.no_follow {
            if let Some(base) = &base {
                outcome.outlinks = content::outlinks(&tree, base);
                let dropped =
                    content::strip_hash_links(
                        &mut outcome.outlinks,
                        &doc.url,
                        &self.config.strip_hash_link_hosts,
                    );
                if dropped > 0 {
                    tracing::debug!(url = %doc.url, dropped, "dropped hash outlinks");
                }
            }
        }
        if outcome.meta.no_cache {
            tree.annotate("noCache", "true");
        }

        if let Some(table) = self.rules.table() {
            let report =
                rules::evaluate_report(RuleInput::Tree(&tree), &doc.base_url, table, self.match_options);
            if self.config.annotate_field_meta {
                for fired in &report.domain_rule_fired {
                    tree.annotate(FIELD_META_KEY, fired.to_string());
                }
            }
            outcome.tag_fields = report.domain_fields;
            outcome.fields = report.fields;
        }
        for (key, values) in tree.annotations() {
            for value in values {
                outcome.add_parse_meta(key, value.clone());
            }
        }

        if let Some(refresh) = &outcome.meta.refresh {
            outcome.status = ParseStatus::SuccessRedirect {
                target: refresh.target.clone().unwrap_or_else(|| doc.url.clone()),
                delay_secs: refresh.delay_secs,
            };
        }

        tracing::debug!(
            url = %doc.url,
            %backend,
            encoding = resolved.name,
            outlinks = outcome.outlinks.len(),
            fields = outcome.fields.len() + outcome.tag_fields.len(),
            "parsed document"
        );
        outcome
    }

    /// Parse markup harvested from a browser render.
    pub fn parse_rendered(&self, url: &str, html: &str) -> ParseOutcome {
        let doc = RawDocument::new(url, html.as_bytes()).with_content_type(RENDERED_CONTENT_TYPE);
        self.parse(&doc)
    }
}
