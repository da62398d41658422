//! Rule file parsing: one rule mapping or a sequence of them.

use super::RuleDefinition;

/// Parse the contents of a rule file into its rule definitions.
///
/// A top-level mapping is a single rule, a top-level sequence is a list of
/// rules. An empty document yields no rules.
pub fn parse_rule_file(contents: &str) -> Result<Vec<RuleDefinition>, serde_yaml::Error> {
    if is_blank_document(contents) {
        return Ok(Vec::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value),
        other => serde_yaml::from_value(other).map(|rule| vec![rule]),
    }
}

fn is_blank_document(contents: &str) -> bool {
    contents.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}
