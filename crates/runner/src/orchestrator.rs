//! Per-run control flow.
//!
//! 1. Build a fresh [`ExecutionContext`].
//! 2. Render search parameters.
//! 3. Run the search.
//! 4. Attach the result and evaluate the decision procedure on the pool.
//! 5. Stop when there are no actions.
//! 6. Pass the throttle gate, holding the rule's permit from here on.
//! 7. Decode all actions, then dispatch them in order.
//! 8. Record the fired time only if every action succeeded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use esalert_core::{ConfigError, ExecutionContext};
use esalert_notify::Dispatcher;
use esalert_rules::scheduler::parse_cooldown;
use esalert_rules::{Rule, RuleRunner, ThrottleDecision, ThrottleGuard};
use esalert_script::{EnginePool, Interpreter};
use esalert_search::SearchClient;

use crate::error::RunError;
use crate::outcome::RunOutcome;

pub struct Orchestrator<I: Interpreter> {
    search: Arc<dyn SearchClient>,
    pool: EnginePool<I>,
    throttle: Arc<ThrottleGuard>,
    dispatcher: Arc<Dispatcher>,
    run_timeout: Option<Duration>,
}

impl<I: Interpreter> Orchestrator<I> {
    pub fn new(
        search: Arc<dyn SearchClient>,
        pool: EnginePool<I>,
        throttle: Arc<ThrottleGuard>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            search,
            pool,
            throttle,
            dispatcher,
            run_timeout: None,
        }
    }

    /// Abandon runs that take longer than `limit`.
    pub fn with_run_timeout(mut self, limit: Option<Duration>) -> Self {
        self.run_timeout = limit;
        self
    }

    /// Run `rule` once, starting now.
    pub async fn run(&self, rule: &Rule) -> Result<RunOutcome, RunError> {
        self.run_at(rule, Utc::now()).await
    }

    /// Run `rule` once with `now` as the run start time.
    pub async fn run_at(&self, rule: &Rule, now: DateTime<Utc>) -> Result<RunOutcome, RunError> {
        match self.run_timeout {
            // Dropping the run releases its throttle permit unrecorded. An
            // evaluation already on a blocking thread keeps its interpreter
            // until the interpreter returns.
            Some(limit) => tokio::time::timeout(limit, self.execute(rule, now))
                .await
                .map_err(|_| RunError::Timeout(limit))?,
            None => self.execute(rule, now).await,
        }
    }

    async fn execute(&self, rule: &Rule, now: DateTime<Utc>) -> Result<RunOutcome, RunError> {
        let ctx = ExecutionContext::new(&rule.name, now, rule.metadata.clone());

        let request = rule.render_search(&ctx)?;
        debug!(rule = %rule.name, index = %request.index, doc_type = %request.doc_type, "search rendered");

        let result = self.search.search(&request).await?;
        let ctx = ctx.with_result(result);

        let payloads = self
            .pool
            .evaluate(&rule.name, &rule.procedure, &ctx.to_value())
            .await?;
        if payloads.is_empty() {
            return Ok(RunOutcome::NoActions);
        }

        let permit = match self.throttle.acquire(&rule.name, ctx.started_ts).await {
            ThrottleDecision::Open(permit) => permit,
            ThrottleDecision::Suppressed { remaining_secs } => {
                return Ok(RunOutcome::Throttled { remaining_secs });
            }
        };

        let actions = self.dispatcher.decode(&payloads)?;
        let delivered = self.dispatcher.dispatch(&ctx, &actions).await?;
        permit.record_fired(ctx.started_ts);

        Ok(RunOutcome::Dispatched { actions: delivered })
    }
}

#[async_trait::async_trait]
impl<I: Interpreter> RuleRunner for Orchestrator<I> {
    async fn run_rule(&self, rule: Arc<Rule>, fired_at: DateTime<Utc>) {
        debug!(rule = %rule.name, %fired_at, "rule triggered");
        let outcome = self.run(&rule).await;
        report_outcome(&rule.name, &outcome);
    }
}

/// Log the result of one run.
pub fn report_outcome(rule: &str, outcome: &Result<RunOutcome, RunError>) {
    match outcome {
        Ok(RunOutcome::NoActions) => debug!(rule, "run complete, no actions"),
        Ok(RunOutcome::Throttled { remaining_secs }) => {
            info!(rule, remaining_secs, "run throttled, actions not dispatched")
        }
        Ok(RunOutcome::Dispatched { actions }) => info!(rule, actions, "run complete, actions dispatched"),
        Err(e) => warn!(rule, stage = e.stage(), error = %e, "run failed"),
    }
}

/// Parse the per-run deadline (`30s`, `5m`, `1h`).
pub fn parse_run_timeout(s: &str) -> Result<Duration, ConfigError> {
    match parse_cooldown(s) {
        Some(limit) if !limit.is_zero() => Ok(limit),
        _ => Err(ConfigError::Invalid {
            key: "run-timeout",
            reason: format!("'{s}' is not a positive <int>[s|m|h] duration"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_timeout_parses_units() {
        assert_eq!(parse_run_timeout("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_run_timeout("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn run_timeout_rejects_zero_and_garbage() {
        assert!(parse_run_timeout("0s").is_err());
        assert!(parse_run_timeout("soon").is_err());
    }

    #[test]
    fn error_stage_labels() {
        let err = RunError::Timeout(Duration::from_secs(1));
        assert_eq!(err.stage(), "timeout");
        assert!(err.to_string().contains("abandoned"));
    }
}
