//! Typed action requests.
//!
//! Decision procedures return untyped tables; each one is decoded into an
//! [`ActionRequest`] by its `type` field. Unknown types and missing required
//! fields fail decoding.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    Log {
        message: String,
    },
    Http {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default, deserialize_with = "map_or_empty")]
        headers: HashMap<String, String>,
        /// String bodies are sent verbatim, anything else as JSON.
        #[serde(default)]
        body: Option<serde_json::Value>,
    },
    Slack {
        text: String,
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        icon_emoji: Option<String>,
    },
    Dingding {
        text: String,
        #[serde(default, deserialize_with = "seq_or_empty")]
        at_mobiles: Vec<String>,
        #[serde(default)]
        is_at_all: bool,
    },
}

fn default_method() -> String {
    "POST".to_string()
}

/// Discriminator of an [`ActionRequest`], used to route to a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Log,
    Http,
    Slack,
    Dingding,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Log => "log",
            ActionKind::Http => "http",
            ActionKind::Slack => "slack",
            ActionKind::Dingding => "dingding",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Log { .. } => ActionKind::Log,
            ActionRequest::Http { .. } => ActionKind::Http,
            ActionRequest::Slack { .. } => ActionKind::Slack,
            ActionRequest::Dingding { .. } => ActionKind::Dingding,
        }
    }

    /// Decode one untyped payload.
    pub fn decode(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }
}

// Lua has a single table type, so an empty list and an empty map look alike.

fn seq_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

fn map_or_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(HashMap::new()),
        serde_json::Value::Array(items) if items.is_empty() => Ok(HashMap::new()),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}
