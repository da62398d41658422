//! Lua 5.4 interpreter instances.

use std::collections::HashMap;
use std::path::Path;

use mlua::{Function, Lua, LuaSerdeExt, RegistryKey, SerializeOptions, Value};

use esalert_core::DecisionProcedure;

use crate::error::ScriptError;
use crate::interpreter::Interpreter;

/// Global name under which the execution context is exposed to procedures.
pub const CONTEXT_GLOBAL: &str = "ctx";

/// Compiled procedure cached per rule, keyed by its source text.
struct CachedChunk {
    source: String,
    function: RegistryKey,
}

/// One independent Lua state.
///
/// Globals persist for the lifetime of the instance, so state written by one
/// run is visible to later runs that land on the same instance.
pub struct LuaInterpreter {
    lua: Lua,
    chunks: HashMap<String, CachedChunk>,
}

impl LuaInterpreter {
    pub fn new() -> Self {
        Self {
            lua: Lua::new(),
            chunks: HashMap::new(),
        }
    }

    /// Execute an init script once in this instance.
    pub fn run_init(&mut self, name: &str, source: &str) -> mlua::Result<()> {
        self.lua.load(source).set_name(name.to_string()).exec()
    }

    /// Convenience for [`run_init`](Self::run_init) with a script on disk.
    pub fn with_init_file(path: &Path, source: &str) -> mlua::Result<Self> {
        let mut interpreter = Self::new();
        interpreter.run_init(&path.display().to_string(), source)?;
        Ok(interpreter)
    }

    fn function_for(&mut self, rule: &str, procedure: &DecisionProcedure) -> mlua::Result<Function> {
        if let Some(cached) = self.chunks.get(rule) {
            if cached.source == procedure.source {
                return self.lua.registry_value(&cached.function);
            }
        }

        let function = self
            .lua
            .load(procedure.source.as_str())
            .set_name(procedure.chunk_name(rule))
            .into_function()?;
        let key = self.lua.create_registry_value(function.clone())?;
        if let Some(old) = self.chunks.insert(
            rule.to_string(),
            CachedChunk {
                source: procedure.source.clone(),
                function: key,
            },
        ) {
            self.lua.remove_registry_value(old.function)?;
        }
        Ok(function)
    }
}

impl Default for LuaInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for LuaInterpreter {
    fn evaluate(
        &mut self,
        rule: &str,
        procedure: &DecisionProcedure,
        ctx: &serde_json::Value,
    ) -> Result<serde_json::Value, ScriptError> {
        let function = self.function_for(rule, procedure)?;
        // JSON null becomes nil, not the `null` sentinel.
        let options = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        let ctx = self.lua.to_value_with(ctx, options)?;
        self.lua.globals().set(CONTEXT_GLOBAL, ctx)?;

        let output: Value = function.call(())?;
        match output {
            // An empty table carries no shape information; treat it as "no actions".
            Value::Nil => Ok(serde_json::Value::Array(Vec::new())),
            Value::Table(ref table) if table.is_empty() => Ok(serde_json::Value::Array(Vec::new())),
            other => Ok(self.lua.from_value(other)?),
        }
    }
}
