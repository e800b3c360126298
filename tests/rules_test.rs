use std::io::Write;
use std::path::PathBuf;

use crawl_harvest::rules::{self, DomainMatch, MatchOptions, MatchPolicy, RuleInput, RuleTable};
use crawl_harvest::{Error, LoadedRules, RuleConfig, RuleSource, RuleStore};

const LISTING: &str = r#"
<html><body>
  <div class="card" data-sku="A1">
    <h2>Lamp</h2><span class="price">19</span><a href="/p/a1">more</a>
    <img data-src="/img/a1.jpg">
  </div>
  <div class="card" data-sku="B2">
    <h2>Desk</h2><span class="price">120</span>
  </div>
  <div class="card" data-sku="">
    <h2>Ghost</h2>
  </div>
  <div class="card"><h2>No sku</h2></div>
</body></html>"#;

fn table(text: &str) -> RuleTable {
    let loaded = RuleTable::parse(text);
    assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);
    loaded.table
}

#[test]
fn price_scenario() {
    let table = table("example.com\tdiv.price\tdata-value\t*\t.amount:*");
    let html = r#"<div class="price" data-value="x"><span class="amount">42</span></div>"#;
    let map = rules::evaluate(RuleInput::Html(html), "https://example.com/item/9", &table, MatchPolicy::LastWins);
    assert_eq!(map.len(), 1);
    let found = map.get("x").expect("x fired");
    assert_eq!(found.sub_outputs, vec![Some("amount:42".to_string())]);
}

#[test]
fn star_pattern_needs_a_non_blank_value() {
    let table = table("shop.test\tdiv.card\tdata-sku\t*\th2:*");
    let map = rules::evaluate(RuleInput::Html(LISTING), "http://shop.test/", &table, MatchPolicy::LastWins);
    let keys: Vec<&str> = map.keys().collect();
    assert_eq!(keys, vec!["A1", "B2"]);
}

#[test]
fn sub_selectors_read_text_and_attributes() {
    let table = table("shop.test\tdiv.card\tdata-sku\t^A\th2:*,span.price:*,a:href,img:data-src,em:*");
    let map = rules::evaluate(RuleInput::Html(LISTING), "http://shop.test/", &table, MatchPolicy::LastWins);
    let a1 = map.get("A1").expect("A1");
    assert_eq!(
        a1.sub_outputs,
        vec![
            Some("h2:Lamp".to_string()),
            Some("spanprice:19".to_string()),
            Some("a:/p/a1".to_string()),
            Some("img:/img/a1.jpg".to_string()),
            None,
        ]
    );
    assert!(map.get("B2").is_none());
}

#[test]
fn field_rules_run_for_every_site() {
    let table = table("div.card\tdata-sku\tB\th2:*");
    for base in ["http://shop.test/", "http://elsewhere.test/"] {
        let map = rules::evaluate(RuleInput::Html(LISTING), base, &table, MatchPolicy::LastWins);
        assert_eq!(map.get("B2").expect("B2").sub_outputs, vec![Some("h2:Desk".to_string())]);
    }
}

#[test]
fn duplicate_keys_follow_policy() {
    let html = r#"<p data-k="same">first</p><p data-k="same">second</p>"#;
    let table = table("a.test\tp\tdata-k\t*\tb:*");
    let eval = |policy| rules::evaluate(RuleInput::Html(html), "http://a.test/", &table, policy);

    assert_eq!(eval(MatchPolicy::LastWins).get_all("same").len(), 1);
    assert_eq!(eval(MatchPolicy::FirstWins).get_all("same").len(), 1);
    assert_eq!(eval(MatchPolicy::CollectAll).get_all("same").len(), 2);
}

#[test]
fn host_matching_is_stricter_than_substring() {
    let table = table("shop.test\tdiv.card\tdata-sku\t*\th2:*");
    let base = "http://mirror.test/?from=shop.test";

    let substring = rules::evaluate(RuleInput::Html(LISTING), base, &table, MatchPolicy::LastWins);
    assert!(!substring.is_empty());

    let host = rules::evaluate(
        RuleInput::Html(LISTING),
        base,
        &table,
        MatchOptions {
            policy: MatchPolicy::LastWins,
            domain_match: DomainMatch::Host,
        },
    );
    assert!(host.is_empty());
}

#[test]
fn rejected_scope_leaves_others_loaded() {
    let loaded = RuleTable::parse(
        "good.test\tp\tid\t*\tb:*\n\
         bad.test\tp\tid\t(\tb:*\n\
         bad.test\tdiv\tid\t*\tb:*\n\
         odd.test\tp\tid\t*\tno-target\n\
         too\tfew\n",
    );
    assert_eq!(loaded.errors.len(), 3);
    assert!(loaded.errors.iter().all(|e| matches!(e, Error::RuleLoad { .. })));
    assert_eq!(loaded.table.domains().collect::<Vec<_>>(), vec!["good.test"]);
    assert!(loaded.table.domain_rules("bad.test").is_empty());
}

#[test]
fn store_reads_a_rule_file_once() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "a.test\tp\tid\t*\tb:*").expect("write");

    let store = RuleStore::new();
    let config = RuleConfig {
        file: Some(file.path().to_path_buf()),
        ..RuleConfig::default()
    };
    assert_eq!(store.load_config(&config).expect("load").table.len(), 1);

    // Later sources are ignored once a table is loaded.
    let again = store
        .load(&RuleSource::Inline("b.test\tp\tid\t*\tb:*\nc.test\tp\tid\t*\tb:*".into()))
        .expect("load");
    assert_eq!(again.table.len(), 1);
}

#[test]
fn inline_rules_take_precedence_over_files() {
    let config = RuleConfig {
        inline: Some("a.test\tp\tid\t*\tb:*".into()),
        file: Some(PathBuf::from("/does/not/exist")),
        plugin_file: Some(PathBuf::from("/neither")),
        ..RuleConfig::default()
    };
    assert!(matches!(RuleSource::from_config(&config), Some(RuleSource::Inline(_))));
}

#[test]
fn missing_rule_file_is_a_source_error_and_retryable() {
    let store = RuleStore::new();
    let missing = RuleSource::File(PathBuf::from("/does/not/exist/rules.txt"));
    assert!(matches!(store.load(&missing), Err(Error::RuleSource(_))));
    assert!(store.table().is_none());

    store
        .load(&RuleSource::Inline("a.test\tp\tid\t*\tb:*".into()))
        .expect("retry");
    assert!(store.table().is_some());
}

#[test]
fn trailing_empty_column_keeps_its_scope() {
    let loaded = RuleTable::parse("example.com\tdiv.price\tdata-value\t*\t\nmeta\tname\t^og:\t\r\n");
    assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);
    assert_eq!(loaded.table.domain_rules("example.com").len(), 1);
    assert!(loaded.table.domain_rules("example.com")[0].sub_selectors.is_empty());
    assert_eq!(loaded.table.field_rules("meta").len(), 1);

    let html = r#"<meta name="og:title" content="T">"#;
    let map = rules::evaluate(RuleInput::Html(html), "http://a.test/", &loaded.table, MatchPolicy::LastWins);
    assert!(map.get("og:title").expect("og:title").sub_outputs.is_empty());
}

#[test]
fn concurrent_first_loads_settle_on_one_table() {
    // Source n holds n rules for `s{n}.test`, so the table size names the winner.
    let sources: Vec<RuleSource> = (1..=8)
        .map(|n| RuleSource::Inline((0..n).map(|i| format!("s{n}.test\tp\tid\t^{i}\tb:*\n")).collect()))
        .collect();
    let store = RuleStore::new();

    let results: Vec<&LoadedRules> = std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let store = &store;
                scope.spawn(move || store.load(source).expect("load"))
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("thread")).collect()
    });

    let winner = results[0];
    assert!(results.iter().all(|loaded| std::ptr::eq(*loaded, winner)));
    let len = winner.table.len();
    assert!((1..=8).contains(&len));
    assert_eq!(winner.table.domains().count(), 1);
    assert_eq!(winner.table.domain_rules(&format!("s{len}.test")).len(), len);
}
