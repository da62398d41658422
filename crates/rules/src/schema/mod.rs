//! YAML schema types with serde deserialization.
//!
//! - `RuleDefinition`: one alert rule as written in a rule file
//! - `ProcessSource`: where the rule's decision procedure comes from
//! - `parse_rule_file`: a file holds either one rule mapping or a list of them

mod definition;
mod file;
mod process;

pub use definition::*;
pub use file::*;
pub use process::*;

#[cfg(test)]
mod tests;
