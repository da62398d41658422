//! Per-run execution context.
//!
//! A fresh [`ExecutionContext`] is built for every rule run. It is the only
//! value the renderer, the decision procedure and the connectors see, and it
//! is never shared between concurrent runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Open key/value metadata attached to a rule.
pub type Metadata = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    /// Name of the rule being run.
    pub name: String,
    /// Run start as epoch seconds.
    pub started_ts: i64,
    /// Run start as wall-clock time (RFC 3339 when serialized).
    pub time: DateTime<Utc>,
    pub metadata: Metadata,
    /// Search response, `null` until the search stage completes.
    pub result: Option<serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>, metadata: Metadata) -> Self {
        Self {
            name: name.into(),
            started_ts: now.timestamp(),
            time: now,
            metadata,
            result: None,
        }
    }

    /// Return a copy of this context carrying the search result.
    pub fn with_result(self, result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            ..self
        }
    }

    /// Serialize into the structured value exposed to templates and scripts.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
