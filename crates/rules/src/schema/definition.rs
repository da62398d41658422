//! Top-level rule definition as it appears in a rule file.

use serde::{Deserialize, Serialize};

use esalert_core::Metadata;

use super::ProcessSource;

/// A single alert rule before initialization.
///
/// Nothing here is validated beyond its YAML shape; templates, the schedule
/// and the throttle period are checked by [`Rule::init`](crate::rule::Rule::init).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDefinition {
    /// Unique rule name within the process.
    pub name: String,
    /// Cron expression; 5-field expressions get a `0` seconds field prepended.
    pub interval: String,
    /// Index selector template.
    #[serde(default)]
    pub search_index: String,
    /// Document type selector template (empty = any type).
    #[serde(default)]
    pub search_type: String,
    /// Structured query template; takes precedence over `search_query`.
    #[serde(default)]
    pub search: Option<serde_json::Value>,
    /// Raw text (YAML or JSON) query template.
    #[serde(default)]
    pub search_query: Option<String>,
    pub process: ProcessSource,
    /// Compact cooldown string (`30s`, `5m`, `2h`). Absent means no cooldown.
    #[serde(default)]
    pub throttle_period: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}
