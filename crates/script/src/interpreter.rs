//! Interpreter trait shared by the pool and its engines.

use esalert_core::DecisionProcedure;

use crate::error::ScriptError;

/// One scripting engine instance.
///
/// Instances are stateful and not reentrant: the pool guarantees that at most
/// one caller uses an instance at a time, so `evaluate` takes `&mut self`.
/// Evaluation runs on a blocking thread, hence the `Send` bound.
pub trait Interpreter: Send + 'static {
    /// Evaluate `procedure` for `rule` with `ctx` exposed to the script.
    ///
    /// Returns the procedure's raw output; the pool checks its shape.
    fn evaluate(
        &mut self,
        rule: &str,
        procedure: &DecisionProcedure,
        ctx: &serde_json::Value,
    ) -> Result<serde_json::Value, ScriptError>;
}
