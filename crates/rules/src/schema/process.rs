//! Decision procedure source reference.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a rule's Lua decision procedure lives. Exactly one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessSource {
    /// Path to a Lua file, relative paths resolve against the rule file's directory.
    #[serde(default)]
    pub lua_file: Option<PathBuf>,
    /// Lua source embedded in the rule file.
    #[serde(default)]
    pub lua_inline: Option<String>,
}
