//! Fixed-size pool of interpreter instances.
//!
//! A run checks out one instance, evaluates on a blocking thread, and the
//! instance goes back to the pool when that thread is done with it. Callers
//! beyond the pool size wait for a free instance.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use esalert_core::DecisionProcedure;

use crate::error::{PoolError, ScriptError};
use crate::interpreter::Interpreter;
use crate::lua::LuaInterpreter;

struct PoolInner<I> {
    idle: Mutex<Vec<I>>,
    permits: Arc<Semaphore>,
    size: usize,
}

/// Shared handle to a pool of interpreters. Cloning is cheap.
pub struct EnginePool<I: Interpreter> {
    inner: Arc<PoolInner<I>>,
}

impl<I: Interpreter> Clone for EnginePool<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// An instance on loan from the pool; returned on drop.
struct PooledEngine<I: Interpreter> {
    engine: Option<I>,
    inner: Arc<PoolInner<I>>,
    _permit: OwnedSemaphorePermit,
}

impl<I: Interpreter> Deref for PooledEngine<I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.engine.as_ref().expect("pooled engine already returned")
    }
}

impl<I: Interpreter> DerefMut for PooledEngine<I> {
    fn deref_mut(&mut self) -> &mut I {
        self.engine.as_mut().expect("pooled engine already returned")
    }
}

impl<I: Interpreter> Drop for PooledEngine<I> {
    fn drop(&mut self) {
        // Runs before `_permit` is released, so a woken waiter always finds an instance.
        if let Some(engine) = self.engine.take() {
            self.inner
                .idle
                .lock()
                .expect("engine pool lock poisoned")
                .push(engine);
        }
    }
}

impl<I: Interpreter> EnginePool<I> {
    /// Build a pool over pre-constructed instances.
    pub fn new(instances: Vec<I>) -> Result<Self, PoolError> {
        if instances.is_empty() {
            return Err(PoolError::Empty);
        }
        let size = instances.len();
        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(instances),
                permits: Arc::new(Semaphore::new(size)),
                size,
            }),
        })
    }

    /// Total number of instances.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Instances not currently on loan.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Refuse new evaluations; runs already holding an instance finish normally.
    pub fn close(&self) {
        self.inner.permits.close();
    }

    async fn checkout(&self) -> Result<PooledEngine<I>, ScriptError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| ScriptError::PoolClosed)?;
        let engine = self
            .inner
            .idle
            .lock()
            .expect("engine pool lock poisoned")
            .pop();
        // A permit guarantees an idle instance; a miss means the pool is being torn down.
        let engine = engine.ok_or(ScriptError::PoolClosed)?;
        Ok(PooledEngine {
            engine: Some(engine),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Evaluate a decision procedure on the next free instance.
    ///
    /// Waits while every instance is busy. The output must be a list; each
    /// element is returned as-is for the dispatcher to decode.
    pub async fn evaluate(
        &self,
        rule: &str,
        procedure: &DecisionProcedure,
        ctx: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>, ScriptError> {
        let mut engine = self.checkout().await?;
        let rule = rule.to_string();
        let procedure = procedure.clone();
        let ctx = ctx.clone();

        tracing::trace!(rule = %rule, available = self.available(), "evaluating decision procedure");
        let output = tokio::task::spawn_blocking(move || engine.evaluate(&rule, &procedure, &ctx))
            .await
            .map_err(|_| ScriptError::Panicked)??;

        into_actions(output)
    }
}

impl EnginePool<LuaInterpreter> {
    /// Build `size` Lua interpreters, running `init_script` in each.
    ///
    /// Fails if the init script cannot be read or fails in any instance.
    pub fn lua(size: usize, init_script: Option<&Path>) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::Empty);
        }
        let init = match init_script {
            Some(path) => {
                let source =
                    std::fs::read_to_string(path).map_err(|source| PoolError::InitScriptRead {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Some((path, source))
            }
            None => None,
        };

        let mut instances = Vec::with_capacity(size);
        for instance in 0..size {
            let interpreter = match &init {
                Some((path, source)) => LuaInterpreter::with_init_file(path, source)
                    .map_err(|source| PoolError::InitScript { instance, source })?,
                None => LuaInterpreter::new(),
            };
            instances.push(interpreter);
        }
        tracing::info!(size, init = init_script.is_some(), "Lua engine pool ready");
        Self::new(instances)
    }
}

fn into_actions(output: serde_json::Value) -> Result<Vec<serde_json::Value>, ScriptError> {
    match output {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Bool(_) => Err(ScriptError::NotASequence("a boolean")),
        serde_json::Value::Number(_) => Err(ScriptError::NotASequence("a number")),
        serde_json::Value::String(_) => Err(ScriptError::NotASequence("a string")),
        serde_json::Value::Object(_) => Err(ScriptError::NotASequence("a table with named keys")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Interpreter that sleeps and records how many instances run at once.
    struct SlowInterpreter {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        output: serde_json::Value,
        delay: Duration,
    }

    impl Interpreter for SlowInterpreter {
        fn evaluate(
            &mut self,
            _rule: &str,
            _procedure: &DecisionProcedure,
            _ctx: &serde_json::Value,
        ) -> Result<serde_json::Value, ScriptError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    struct PanickingInterpreter;

    impl Interpreter for PanickingInterpreter {
        fn evaluate(
            &mut self,
            rule: &str,
            _procedure: &DecisionProcedure,
            _ctx: &serde_json::Value,
        ) -> Result<serde_json::Value, ScriptError> {
            if rule == "panic" {
                panic!("interpreter blew up");
            }
            Ok(json!([]))
        }
    }

    fn slow_pool(size: usize, output: serde_json::Value) -> (EnginePool<SlowInterpreter>, Arc<AtomicUsize>) {
        slow_pool_with_delay(size, output, Duration::from_millis(30))
    }

    fn slow_pool_with_delay(
        size: usize,
        output: serde_json::Value,
        delay: Duration,
    ) -> (EnginePool<SlowInterpreter>, Arc<AtomicUsize>) {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let instances = (0..size)
            .map(|_| SlowInterpreter {
                in_flight: Arc::clone(&in_flight),
                max_in_flight: Arc::clone(&max_in_flight),
                output: output.clone(),
                delay,
            })
            .collect();
        (EnginePool::new(instances).unwrap(), max_in_flight)
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(
            EnginePool::<LuaInterpreter>::new(Vec::new()),
            Err(PoolError::Empty)
        ));
        assert!(matches!(EnginePool::lua(0, None), Err(PoolError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_use_never_exceeds_pool_size() {
        let (pool, max_in_flight) = slow_pool(2, json!([{"type": "log"}]));
        let procedure = DecisionProcedure::inline("");

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            let procedure = procedure.clone();
            handles.push(tokio::spawn(async move {
                pool.evaluate(&format!("rule-{i}"), &procedure, &json!({})).await
            }));
        }
        for handle in handles {
            let actions = handle.await.unwrap().unwrap();
            assert_eq!(actions.len(), 1);
        }

        assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn non_sequence_output_is_an_error() {
        let (pool, _) = slow_pool(1, json!({"type": "log"}));
        let err = pool
            .evaluate("r", &DecisionProcedure::inline(""), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::NotASequence(_)));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn panic_is_reported_and_instance_returned() {
        let pool = EnginePool::new(vec![PanickingInterpreter]).unwrap();
        let procedure = DecisionProcedure::inline("");

        let err = pool.evaluate("panic", &procedure, &json!({})).await.unwrap_err();
        assert!(matches!(err, ScriptError::Panicked));

        let actions = pool.evaluate("fine", &procedure, &json!({})).await.unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn abandoned_evaluation_holds_instance_until_interpreter_returns() {
        let (pool, _) = slow_pool_with_delay(1, json!([]), Duration::from_millis(300));
        let procedure = DecisionProcedure::inline("");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            pool.evaluate("r", &procedure, &json!({})),
        )
        .await;
        assert!(abandoned.is_err());
        // The interpreter is still running on its blocking thread.
        assert_eq!(pool.available(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(pool.available(), 1);
        let actions = pool.evaluate("r", &procedure, &json!({})).await.unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn closed_pool_refuses_evaluation() {
        let (pool, _) = slow_pool(1, json!([]));
        pool.close();
        let err = pool
            .evaluate("r", &DecisionProcedure::inline(""), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::PoolClosed));
    }

    #[tokio::test]
    async fn lua_pool_runs_init_script_in_every_instance() {
        let dir = tempfile::TempDir::new().unwrap();
        let init = dir.path().join("init.lua");
        std::fs::write(&init, "threshold = 5").unwrap();

        let pool = EnginePool::lua(2, Some(&init)).unwrap();
        let procedure = DecisionProcedure::inline(
            "if ctx.count > threshold then return { { type = 'log', message = 'high' } } end",
        );
        let actions = pool.evaluate("r", &procedure, &json!({"count": 9})).await.unwrap();
        assert_eq!(actions, vec![json!({"type": "log", "message": "high"})]);
        let actions = pool.evaluate("r", &procedure, &json!({"count": 1})).await.unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn failing_init_script_fails_pool_construction() {
        let dir = tempfile::TempDir::new().unwrap();
        let init = dir.path().join("init.lua");
        std::fs::write(&init, "error('bad init')").unwrap();
        assert!(matches!(
            EnginePool::lua(2, Some(&init)),
            Err(PoolError::InitScript { instance: 0, .. })
        ));
    }

    #[test]
    fn missing_init_script_fails_pool_construction() {
        assert!(matches!(
            EnginePool::lua(1, Some(Path::new("/nonexistent/esalert/init.lua"))),
            Err(PoolError::InitScriptRead { .. })
        ));
    }
}
