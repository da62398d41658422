//! Tests for schema types.

use super::*;

const SINGLE_RULE_YAML: &str = r#"
name: error-spike
interval: "0 */5 * * * *"
search_index: "logstash-{{ time | strftime('%Y.%m.%d') }}"
search_type: logs
search:
  query:
    range:
      "@timestamp":
        gte: "now-5m"
process:
  lua_inline: |
    if ctx.result.hits.total > 0 then
      return {{type = "log", message = "errors found"}}
    end
throttle_period: 10m
metadata:
  owner: ops
  threshold: 5
"#;

const MULTI_RULE_YAML: &str = r#"
- name: first
  interval: "*/5 * * * *"
  search_index: logs
  search_query: '{"query": {"match_all": {}}}'
  process:
    lua_file: first.lua
- name: second
  interval: "0 0 * * * *"
  search_index: metrics
  process:
    lua_inline: "return {}"
  throttle_period: 1h
"#;

#[test]
fn parse_single_rule_mapping() {
    let rules = parse_rule_file(SINGLE_RULE_YAML).unwrap();
    assert_eq!(rules.len(), 1);

    let rule = &rules[0];
    assert_eq!(rule.name, "error-spike");
    assert_eq!(rule.interval, "0 */5 * * * *");
    assert_eq!(rule.search_type, "logs");
    assert_eq!(rule.throttle_period.as_deref(), Some("10m"));
    assert!(rule.search_query.is_none());
    assert!(rule.process.lua_file.is_none());
    assert!(rule.process.lua_inline.as_deref().unwrap().contains("ctx.result"));

    let search = rule.search.as_ref().unwrap();
    assert_eq!(search["query"]["range"]["@timestamp"]["gte"], "now-5m");

    assert_eq!(rule.metadata["owner"], "ops");
    assert_eq!(rule.metadata["threshold"], 5);
}

#[test]
fn parse_rule_sequence() {
    let rules = parse_rule_file(MULTI_RULE_YAML).unwrap();
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);

    assert_eq!(
        rules[0].process.lua_file.as_deref(),
        Some(std::path::Path::new("first.lua"))
    );
    assert!(rules[0].search.is_none());
    assert!(rules[0].search_query.as_deref().unwrap().contains("match_all"));
    assert!(rules[0].throttle_period.is_none());
    assert!(rules[0].metadata.is_empty());
}

#[test]
fn parse_empty_file_yields_no_rules() {
    assert!(parse_rule_file("").unwrap().is_empty());
    assert!(parse_rule_file("# only a comment\n").unwrap().is_empty());
}

#[test]
fn missing_required_field_is_an_error() {
    let yaml = r#"
name: no-interval
process:
  lua_inline: "return {}"
"#;
    let err = parse_rule_file(yaml).unwrap_err();
    assert!(err.to_string().contains("interval"));
}

#[test]
fn scalar_document_is_an_error() {
    assert!(parse_rule_file("just a string").is_err());
}
