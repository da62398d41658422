//! Values passed between the rule, search and scripting stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fully rendered search parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Rendered index selector (may contain wildcards or comma lists).
    pub index: String,
    /// Rendered document type selector; empty means "any type".
    pub doc_type: String,
    /// Rendered query body.
    pub query: serde_json::Value,
}

/// Scripted decision procedure source, resolved at rule initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionProcedure {
    /// File the source was read from, `None` for inline procedures.
    pub path: Option<PathBuf>,
    pub source: String,
}

impl DecisionProcedure {
    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            path: None,
            source: source.into(),
        }
    }

    /// Label used in interpreter error messages and stack traces.
    pub fn chunk_name(&self, rule: &str) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => format!("{rule}:inline"),
        }
    }
}
