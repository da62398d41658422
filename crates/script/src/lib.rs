//! Decision procedure evaluation.
//!
//! This crate provides:
//! - [`Interpreter`]: one stateful, single-threaded scripting engine instance
//! - [`LuaInterpreter`]: Lua 5.4 implementation (via `mlua`)
//! - [`EnginePool`]: a fixed-size pool that lends instances to concurrent runs

pub mod error;
pub mod interpreter;
pub mod lua;
pub mod pool;

pub use error::{PoolError, ScriptError};
pub use interpreter::Interpreter;
pub use lua::LuaInterpreter;
pub use pool::EnginePool;
