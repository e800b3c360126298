//! Extraction Rule Engine
//!
//! Rules are tab-separated lines:
//!
//! ```text
//! # domain      element selector   attribute    regex   sub-selectors
//! example.com   div.price          data-value   *       .amount:*,img:src
//! # field       attribute          regex        sub-selectors
//! meta          name               ^og:         meta:content
//! ```
//!
//! Five columns make a domain-scoped rule that only runs for base URLs
//! matching the domain. Four columns make a field-scoped rule that runs for
//! every document, using the field name as element selector. A regex of `*`
//! means "attribute present and not blank".
//!
//! An element fires when its attribute is non-empty and the regex finds a
//! match in it. Every sub-selector `selector:target` is then resolved inside
//! that element: `*` takes the joined text of all matches, any other target
//! names an attribute read from the first match carrying it. Outputs are
//! `key:value` where `key` is the selector with `[`, `]` and `.` removed.
//!
//! A bad line rejects its whole scope; other scopes still load.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RuleConfig;
use crate::dom::{self, Document, NodeRef};
use crate::error::{Error, Result};
use crate::patterns::SELECTOR_KEY_STRIP;
use crate::tree::DocumentTree;
use crate::url_utils;

/// Regex shorthand for "any non-blank value".
const ANY_VALUE: &str = "*";

/// What a rule is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleScope {
    /// Applies when the document's base URL matches the domain.
    Domain(String),
    /// Applies to every document; the name doubles as element selector.
    Field(String),
}

impl RuleScope {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Domain(name) | Self::Field(name) => name,
        }
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(name) => write!(f, "domain {name}"),
            Self::Field(name) => write!(f, "field {name}"),
        }
    }
}

/// What a sub-selector reads from its matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubTarget {
    /// Joined text of every match.
    Text,
    /// Attribute of the first match that has it.
    Attribute(String),
}

/// A `selector:target` pair resolved inside a fired element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSelector {
    pub selector: String,
    pub target: SubTarget,
    /// Output key: the selector without `[`, `]` and `.`.
    pub key: String,
}

impl SubSelector {
    /// Parse `selector:target`, splitting at the last `:`.
    pub fn parse(pair: &str) -> std::result::Result<Self, String> {
        let pair = pair.trim();
        let Some((selector, target)) = pair.rsplit_once(':') else {
            return Err(format!("sub-selector '{pair}' has no ':target'"));
        };
        let (selector, target) = (selector.trim(), target.trim());
        if selector.is_empty() || target.is_empty() {
            return Err(format!("sub-selector '{pair}' needs both selector and target"));
        }
        check_selector(selector)?;

        Ok(Self {
            selector: selector.to_string(),
            target: if target == ANY_VALUE {
                SubTarget::Text
            } else {
                SubTarget::Attribute(target.to_string())
            },
            key: SELECTOR_KEY_STRIP.replace_all(selector, "").into_owned(),
        })
    }

    /// Resolve against a fired element. Blank results are `None`.
    fn resolve(&self, element: &NodeRef) -> Option<String> {
        let matches = dom::select_within(element, &self.selector);
        if matches.is_empty() {
            return None;
        }
        let value = match &self.target {
            SubTarget::Text => dom::joined_text(&matches),
            SubTarget::Attribute(name) => dom::first_attribute(&matches, name)?,
        };
        if value.trim().is_empty() {
            None
        } else {
            Some(format!("{}:{value}", self.key))
        }
    }
}

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub scope: RuleScope,
    pub element_selector: String,
    pub attribute: String,
    pub value_pattern: Regex,
    pub sub_selectors: Vec<SubSelector>,
}

impl ExtractionRule {
    /// Compile one rule from its columns.
    pub fn new(
        scope: RuleScope,
        element_selector: &str,
        attribute: &str,
        pattern: &str,
        sub_selectors: &str,
    ) -> std::result::Result<Self, String> {
        let element_selector = element_selector.trim();
        let attribute = attribute.trim();
        let pattern = pattern.trim();
        if attribute.is_empty() {
            return Err("empty attribute column".to_string());
        }
        check_selector(element_selector)?;

        let pattern = if pattern == ANY_VALUE { r"\S" } else { pattern };
        let value_pattern =
            Regex::new(pattern).map_err(|e| format!("invalid regex '{pattern}': {e}"))?;

        let sub_selectors = sub_selectors
            .split(',')
            .filter(|pair| !pair.trim().is_empty())
            .map(SubSelector::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            scope,
            element_selector: element_selector.to_string(),
            attribute: attribute.to_string(),
            value_pattern,
            sub_selectors,
        })
    }

    /// Fire against every candidate element of `doc`.
    fn apply(&self, doc: &Document) -> Vec<FieldMatch> {
        let mut matches = Vec::new();
        for element in dom::select_all(doc, &self.element_selector) {
            let Some(content) = dom::attribute(&element, &self.attribute) else {
                continue;
            };
            if content.is_empty() || !self.value_pattern.is_match(&content) {
                continue;
            }
            let sub_outputs = self
                .sub_selectors
                .iter()
                .map(|sub| sub.resolve(&element))
                .collect();
            matches.push(FieldMatch {
                matched_content: content,
                sub_outputs,
            });
        }
        matches
    }
}

fn check_selector(selector: &str) -> std::result::Result<(), String> {
    if selector.is_empty() {
        return Err("empty selector".to_string());
    }
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| format!("invalid selector '{selector}': {e}"))
}

/// Rules grouped by scope, in load order.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    domains: Vec<(String, Vec<ExtractionRule>)>,
    fields: Vec<(String, Vec<ExtractionRule>)>,
}

/// Result of loading rule text: the usable table plus one error per bad line.
#[derive(Debug, Default)]
pub struct LoadedRules {
    pub table: RuleTable,
    pub errors: Vec<Error>,
}

impl RuleTable {
    /// Parse rule text. Never fails as a whole; see [`LoadedRules::errors`].
    #[must_use]
    pub fn parse(text: &str) -> LoadedRules {
        let mut parsed: Vec<(usize, RuleScope, std::result::Result<ExtractionRule, String>)> =
            Vec::new();
        let mut rejected: HashSet<RuleScope> = HashSet::new();
        let mut errors = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            // Only spaces and `\r` are stripped so a trailing empty column survives.
            let line = raw.trim_matches(|c| c == ' ' || c == '\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split('\t').map(str::trim).collect();
            let (scope, rule) = match parts.as_slice() {
                [domain, selector, attribute, pattern, subs] => {
                    let scope = RuleScope::Domain((*domain).to_string());
                    let rule = ExtractionRule::new(scope.clone(), selector, attribute, pattern, subs);
                    (scope, rule)
                }
                [field, attribute, pattern, subs] => {
                    let scope = RuleScope::Field((*field).to_string());
                    let rule = ExtractionRule::new(scope.clone(), field, attribute, pattern, subs);
                    (scope, rule)
                }
                _ => {
                    let name = parts.first().copied().unwrap_or_default().to_string();
                    let reason = format!(
                        "line {line_no}: expected 4 or 5 tab-separated columns, found {}",
                        parts.len()
                    );
                    rejected.insert(RuleScope::Domain(name.clone()));
                    rejected.insert(RuleScope::Field(name.clone()));
                    errors.push(Error::RuleLoad { scope: name, reason });
                    continue;
                }
            };
            if let Err(reason) = &rule {
                rejected.insert(scope.clone());
                errors.push(Error::RuleLoad {
                    scope: scope.to_string(),
                    reason: format!("line {line_no}: {reason}"),
                });
            }
            parsed.push((line_no, scope, rule));
        }

        let mut table = RuleTable::default();
        for (line_no, scope, rule) in parsed {
            if rejected.contains(&scope) {
                tracing::debug!(%scope, line_no, "skipping rule in rejected scope");
                continue;
            }
            if let Ok(rule) = rule {
                table.push(rule);
            }
        }

        for error in &errors {
            tracing::warn!(%error, "rejected extraction rule scope");
        }
        tracing::info!(
            domains = table.domains.len(),
            fields = table.fields.len(),
            rules = table.len(),
            rejected = rejected.len(),
            "loaded extraction rules"
        );
        LoadedRules { table, errors }
    }

    fn push(&mut self, rule: ExtractionRule) {
        let (groups, name) = match &rule.scope {
            RuleScope::Domain(name) => (&mut self.domains, name.clone()),
            RuleScope::Field(name) => (&mut self.fields, name.clone()),
        };
        match groups.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, rules)) => rules.push(rule),
            None => groups.push((name, vec![rule])),
        }
    }

    /// Rules registered for one domain, in load order.
    #[must_use]
    pub fn domain_rules(&self, domain: &str) -> &[ExtractionRule] {
        Self::group(&self.domains, domain)
    }

    /// Rules registered for one field, in load order.
    #[must_use]
    pub fn field_rules(&self, field: &str) -> &[ExtractionRule] {
        Self::group(&self.fields, field)
    }

    fn group<'a>(groups: &'a [(String, Vec<ExtractionRule>)], name: &str) -> &'a [ExtractionRule] {
        groups
            .iter()
            .find(|(existing, _)| existing == name)
            .map_or(&[], |(_, rules)| rules.as_slice())
    }

    /// Domains with at least one rule.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|(name, _)| name.as_str())
    }

    /// Fields with at least one rule.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Total number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains
            .iter()
            .chain(&self.fields)
            .map(|(_, rules)| rules.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where rule text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Inline(String),
    File(PathBuf),
    PluginFile(PathBuf),
}

impl RuleSource {
    /// Pick the source by precedence: inline, then file, then plugin file.
    /// Blank values count as absent.
    #[must_use]
    pub fn from_config(config: &RuleConfig) -> Option<Self> {
        let blank_path = |p: &&PathBuf| p.as_os_str().is_empty();
        if let Some(inline) = config.inline.as_ref().filter(|s| !s.trim().is_empty()) {
            return Some(Self::Inline(inline.clone()));
        }
        if let Some(file) = config.file.as_ref().filter(|p| !blank_path(p)) {
            return Some(Self::File(file.clone()));
        }
        config
            .plugin_file
            .as_ref()
            .filter(|p| !blank_path(p))
            .map(|p| Self::PluginFile(p.clone()))
    }

    /// Read the rule text.
    pub fn read(&self) -> Result<String> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::File(path) | Self::PluginFile(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::RuleSource(format!("{}: {e}", path.display()))),
        }
    }
}

/// Holds one rule table, loaded at most once.
///
/// Concurrent first loads are serialized; later calls return the table that
/// won regardless of the source they pass. A source that cannot be read
/// leaves the store empty so a later call may retry.
#[derive(Debug, Default)]
pub struct RuleStore {
    loaded: OnceCell<LoadedRules>,
}

impl RuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `source` unless a table is already present.
    pub fn load(&self, source: &RuleSource) -> Result<&LoadedRules> {
        self.loaded.get_or_try_init(|| {
            tracing::debug!(?source, "reading extraction rules");
            let text = source.read()?;
            Ok(RuleTable::parse(&text))
        })
    }

    /// Load from configuration; with no configured source the store holds an
    /// empty table.
    pub fn load_config(&self, config: &RuleConfig) -> Result<&LoadedRules> {
        match RuleSource::from_config(config) {
            Some(source) => self.load(&source),
            None => Ok(self.loaded.get_or_init(|| {
                tracing::warn!("no extraction rule source configured");
                LoadedRules::default()
            })),
        }
    }

    /// The loaded table, if any.
    #[must_use]
    pub fn table(&self) -> Option<&RuleTable> {
        self.loaded.get().map(|loaded| &loaded.table)
    }
}

/// How repeated keys combine in a [`FieldMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// A later match replaces an earlier one.
    #[default]
    LastWins,
    /// The first match is kept.
    FirstWins,
    /// Every match is kept, in firing order.
    CollectAll,
}

/// How a domain-scoped rule is matched against the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainMatch {
    /// The base URL contains the domain anywhere.
    #[default]
    Substring,
    /// The base URL's host is the domain or a subdomain of it.
    Host,
}

impl DomainMatch {
    #[must_use]
    pub fn applies(self, domain: &str, base_url: &str) -> bool {
        match self {
            Self::Substring => base_url.contains(domain),
            Self::Host => {
                url_utils::host_of(base_url).is_some_and(|host| url_utils::host_matches(&host, domain))
            }
        }
    }
}

/// Evaluation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    pub policy: MatchPolicy,
    pub domain_match: DomainMatch,
}

impl From<MatchPolicy> for MatchOptions {
    fn from(policy: MatchPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

impl From<&RuleConfig> for MatchOptions {
    fn from(config: &RuleConfig) -> Self {
        Self {
            policy: config.match_policy,
            domain_match: config.domain_match,
        }
    }
}

/// One firing of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    /// The attribute value that fired; also the map key.
    pub matched_content: String,
    /// One entry per sub-selector, in rule order.
    pub sub_outputs: Vec<Option<String>>,
}

/// Matches keyed by matched attribute value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, Vec<FieldMatch>>);

impl FieldMap {
    fn insert(&mut self, found: FieldMatch, policy: MatchPolicy) {
        let slot = self.0.entry(found.matched_content.clone()).or_default();
        match policy {
            MatchPolicy::LastWins => {
                slot.clear();
                slot.push(found);
            }
            MatchPolicy::FirstWins => {
                if slot.is_empty() {
                    slot.push(found);
                }
            }
            MatchPolicy::CollectAll => slot.push(found),
        }
    }

    fn merge(&mut self, other: FieldMap, policy: MatchPolicy) {
        for found in other.0.into_values().flatten() {
            self.insert(found, policy);
        }
    }

    /// The match kept for `key`; under `CollectAll` the first one.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldMatch> {
        self.0.get(key).and_then(|all| all.first())
    }

    /// Every match kept for `key`.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[FieldMatch] {
        self.0.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldMatch)> {
        self.0
            .iter()
            .flat_map(|(key, all)| all.iter().map(move |m| (key.as_str(), m)))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The document rules run against.
#[derive(Debug, Clone, Copy)]
pub enum RuleInput<'a> {
    /// Raw markup, parsed fresh.
    Html(&'a str),
    /// An already-built tree, serialized and re-parsed for selector support.
    Tree(&'a DocumentTree),
}

impl RuleInput<'_> {
    fn document(&self) -> Document {
        match self {
            Self::Html(html) => dom::parse(html),
            Self::Tree(tree) => dom::parse(&tree.to_html()),
        }
    }
}

/// Detailed evaluation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    /// Matches of domain-scoped rules.
    pub domain_fields: FieldMap,
    /// Matches of field-scoped rules.
    pub fields: FieldMap,
    /// For each applicable domain-scoped rule in table order, whether it fired.
    pub domain_rule_fired: Vec<bool>,
}

/// Run every applicable rule and report domain and field matches separately.
#[must_use]
pub fn evaluate_report(
    input: RuleInput<'_>,
    base_url: &str,
    table: &RuleTable,
    options: MatchOptions,
) -> RuleReport {
    let mut report = RuleReport::default();
    if table.is_empty() {
        return report;
    }
    let doc = input.document();

    for (domain, rules) in &table.domains {
        if !options.domain_match.applies(domain, base_url) {
            continue;
        }
        for rule in rules {
            let found = rule.apply(&doc);
            report.domain_rule_fired.push(!found.is_empty());
            for m in found {
                report.domain_fields.insert(m, options.policy);
            }
        }
    }

    for (_, rules) in &table.fields {
        for rule in rules {
            for m in rule.apply(&doc) {
                report.fields.insert(m, options.policy);
            }
        }
    }

    tracing::debug!(
        base_url,
        domain_matches = report.domain_fields.len(),
        field_matches = report.fields.len(),
        "evaluated extraction rules"
    );
    report
}

/// Run every applicable rule; domain and field matches share one map.
#[must_use]
pub fn evaluate(
    input: RuleInput<'_>,
    base_url: &str,
    table: &RuleTable,
    options: impl Into<MatchOptions>,
) -> FieldMap {
    let options = options.into();
    let report = evaluate_report(input, base_url, table, options);
    let mut map = report.domain_fields;
    map.merge(report.fields, options.policy);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE_RULE: &str = "example.com\tdiv.price\tdata-value\t*\t.amount:*";
    const PRICE_PAGE: &str =
        r#"<div class="price" data-value="x"><span class="amount">42</span></div>"#;

    fn table(text: &str) -> RuleTable {
        let loaded = RuleTable::parse(text);
        assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);
        loaded.table
    }

    #[test]
    fn price_rule_fires() {
        let table = table(PRICE_RULE);
        let map = evaluate(
            RuleInput::Html(PRICE_PAGE),
            "http://example.com/p/1",
            &table,
            MatchPolicy::LastWins,
        );
        let found = map.get("x").expect("match for x");
        assert_eq!(found.matched_content, "x");
        assert_eq!(found.sub_outputs, vec![Some("amount:42".to_string())]);
    }

    #[test]
    fn domain_rules_skip_other_sites() {
        let table = table(PRICE_RULE);
        let map = evaluate(
            RuleInput::Html(PRICE_PAGE),
            "http://other.test/",
            &table,
            MatchPolicy::LastWins,
        );
        assert!(map.is_empty());
    }

    #[test]
    fn duplicate_scopes_append() {
        let table = table(
            "example.com\tdiv\tid\t*\tb:*\n\
             # comment\n\
             \n\
             example.com\tspan\tclass\t^a\ti:*,u:title\n",
        );
        let rules = table.domain_rules("example.com");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].element_selector, "div");
        assert_eq!(rules[1].element_selector, "span");
        assert_eq!(rules[1].sub_selectors.len(), 2);
        assert_eq!(table.domains().collect::<Vec<_>>(), vec!["example.com"]);
    }

    #[test]
    fn missing_or_blank_attribute_never_fires() {
        let table = table("example.com\tdiv\tdata-v\t*\tb:*");
        let html = r#"<div>no attr</div><div data-v="">empty</div><div data-v="  ">blank</div>"#;
        let report = evaluate_report(
            RuleInput::Html(html),
            "example.com",
            &table,
            MatchOptions::default(),
        );
        assert!(report.domain_fields.is_empty());
        assert_eq!(report.domain_rule_fired, vec![false]);
    }

    #[test]
    fn star_pattern_needs_non_blank_value() {
        let rule = ExtractionRule::new(RuleScope::Field("p".into()), "p", "title", "*", "")
            .expect("rule");
        assert!(rule.value_pattern.is_match("a"));
        assert!(!rule.value_pattern.is_match(" \t"));
        assert!(!rule.value_pattern.is_match(""));
    }

    #[test]
    fn sub_selector_splits_at_last_colon() {
        let sub = SubSelector::parse("li:first-child:data-id").expect("sub");
        assert_eq!(sub.selector, "li:first-child");
        assert_eq!(sub.target, SubTarget::Attribute("data-id".into()));
        let sub = SubSelector::parse("a.link[href]:*").expect("sub");
        assert_eq!(sub.target, SubTarget::Text);
        assert_eq!(sub.key, "alinkhref");
        assert!(SubSelector::parse(".amount").is_err());
    }

    #[test]
    fn field_rules_select_by_field_name() {
        let html = r#"<html><head></head><body>
            <div name="og:title"><span> A </span><span>B</span><img alt="x"><img src="/p.png"></div>
            </body></html>"#;

        let by_meta = table("meta\tname\t^og:\tspan:*");
        assert!(evaluate(RuleInput::Html(html), "", &by_meta, MatchPolicy::LastWins).is_empty());

        let by_div = table("div\tname\t^og:\tspan:*,img:src,em:*");
        assert_eq!(by_div.fields().collect::<Vec<_>>(), vec!["div"]);
        let map = evaluate(RuleInput::Html(html), "", &by_div, MatchPolicy::LastWins);
        let found = map.get("og:title").expect("match");
        assert_eq!(
            found.sub_outputs,
            vec![Some("span:A B".to_string()), Some("img:/p.png".to_string()), None]
        );
    }

    #[test]
    fn bad_line_rejects_whole_scope() {
        let loaded = RuleTable::parse(
            "a.test\tdiv\tid\t*\tb:*\n\
             a.test\tdiv\tid\t([\tb:*\n\
             a.test\tp\tid\t*\tb:*\n\
             b.test\tdiv\tid\t*\tb:*\n\
             c.test\tdiv[\tid\t*\tb:*\n\
             d.test\tdiv\tid\t*\tnocolon\n\
             too\tfew\n",
        );
        assert_eq!(loaded.errors.len(), 4);
        assert!(loaded
            .errors
            .iter()
            .all(|e| matches!(e, Error::RuleLoad { .. })));
        assert!(loaded.table.domain_rules("a.test").is_empty());
        assert_eq!(loaded.table.domain_rules("b.test").len(), 1);
        assert!(loaded.table.domain_rules("c.test").is_empty());
        assert!(loaded.table.domain_rules("d.test").is_empty());
        assert_eq!(loaded.table.len(), 1);
    }

    #[test]
    fn match_policies() {
        let table = table("example.com\tli\tdata-k\t*\tb:*");
        let html = r#"<ul><li data-k="k"><b>one</b></li><li data-k="k"><b>two</b></li></ul>"#;
        let run = |policy| evaluate(RuleInput::Html(html), "example.com", &table, policy);

        let last = run(MatchPolicy::LastWins);
        assert_eq!(last.get("k").expect("k").sub_outputs[0].as_deref(), Some("b:two"));
        let first = run(MatchPolicy::FirstWins);
        assert_eq!(first.get("k").expect("k").sub_outputs[0].as_deref(), Some("b:one"));
        let all = run(MatchPolicy::CollectAll);
        assert_eq!(all.get_all("k").len(), 2);
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn host_matching_is_stricter_than_substring() {
        assert!(DomainMatch::Substring.applies("example.com", "http://notexample.com/"));
        assert!(!DomainMatch::Host.applies("example.com", "http://notexample.com/"));
        assert!(DomainMatch::Host.applies("example.com", "https://shop.example.com/a"));
    }

    #[test]
    fn rule_store_loads_once() {
        let store = RuleStore::new();
        assert!(store.table().is_none());
        let first = store
            .load(&RuleSource::Inline(PRICE_RULE.to_string()))
            .expect("load");
        assert_eq!(first.table.len(), 1);
        let second = store
            .load(&RuleSource::Inline(String::new()))
            .expect("load");
        assert_eq!(second.table.len(), 1);
    }

    #[test]
    fn unreadable_source_leaves_store_empty() {
        let store = RuleStore::new();
        let missing = RuleSource::File(PathBuf::from("/nonexistent/rules.txt"));
        assert!(matches!(store.load(&missing), Err(Error::RuleSource(_))));
        assert!(store.table().is_none());
        assert!(store.load(&RuleSource::Inline(PRICE_RULE.into())).is_ok());
    }

    #[test]
    fn source_precedence() {
        let mut config = RuleConfig {
            inline: Some("  ".into()),
            file: Some(PathBuf::from("rules.txt")),
            plugin_file: Some(PathBuf::from("plugin.txt")),
            ..RuleConfig::default()
        };
        assert_eq!(
            RuleSource::from_config(&config),
            Some(RuleSource::File(PathBuf::from("rules.txt")))
        );
        config.inline = Some(PRICE_RULE.into());
        assert!(matches!(RuleSource::from_config(&config), Some(RuleSource::Inline(_))));
        config.inline = None;
        config.file = None;
        assert_eq!(
            RuleSource::from_config(&config),
            Some(RuleSource::PluginFile(PathBuf::from("plugin.txt")))
        );
    }
}
