//! [`RuleScheduler`]: one independent timer task per rule.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::rule::Rule;

use super::cron::{next_trigger, skipped_triggers};
use super::entry::{RuleScheduleEntry, ScheduleStats};

/// Executes one run of a rule when its timer fires.
///
/// Implementations must not panic on run failures; a run's errors stay inside
/// the run and are only logged.
#[async_trait::async_trait]
pub trait RuleRunner: Send + Sync + 'static {
    async fn run_rule(&self, rule: Arc<Rule>, fired_at: DateTime<Utc>);
}

/// Owns one recurring timer per rule.
///
/// Add rules with [`add_rule`](RuleScheduler::add_rule), then call
/// [`start`](RuleScheduler::start) once. [`shutdown`](RuleScheduler::shutdown)
/// stops all timers; runs already in flight are allowed to finish.
pub struct RuleScheduler {
    entries: HashMap<String, RuleScheduleEntry>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl RuleScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            tasks: Vec::new(),
        }
    }

    /// Register a rule. Returns `false` (and ignores the rule) if a rule with
    /// the same name is already registered.
    pub fn add_rule(&mut self, rule: Arc<Rule>) -> bool {
        if self.entries.contains_key(&rule.name) {
            warn!(rule = %rule.name, "duplicate rule name, ignoring later definition");
            return false;
        }
        self.entries.insert(
            rule.name.clone(),
            RuleScheduleEntry {
                rule,
                stats: Arc::new(ScheduleStats::default()),
            },
        );
        true
    }

    /// Spawn one timer task per registered rule.
    pub fn start(&mut self, runner: Arc<dyn RuleRunner>) {
        info!(rules = self.entries.len(), "starting rule timers");
        for entry in self.entries.values() {
            let task = tokio::spawn(rule_loop(
                entry.clone(),
                Arc::clone(&runner),
                Arc::clone(&self.shutdown),
                Arc::clone(&self.wake),
            ));
            self.tasks.push(task);
        }
    }

    /// Signal every timer to stop.
    pub fn shutdown(&self) {
        info!("rule scheduler shutdown requested");
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Get an Arc to the shutdown flag (for external shutdown signaling).
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Wait for every timer task to exit.
    pub async fn join(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "rule timer task panicked");
            }
        }
    }

    /// Get a scheduling entry by rule name.
    pub fn get(&self, name: &str) -> Option<&RuleScheduleEntry> {
        self.entries.get(name)
    }

    /// Number of tracked rules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scheduler has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RuleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn rule_loop(
    entry: RuleScheduleEntry,
    runner: Arc<dyn RuleRunner>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    let rule = entry.rule;
    let mut after = Utc::now();

    loop {
        let notified = wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let Some(fire_at) = next_trigger(&rule.schedule, after) else {
            warn!(rule = %rule.name, cron = %rule.cron_expression, "schedule has no upcoming trigger, timer stopped");
            break;
        };

        let wait = (fire_at - Utc::now()).to_std().unwrap_or_default();
        debug!(rule = %rule.name, next = %fire_at, "waiting for next trigger");
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut notified => break,
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        entry.stats.record_run();
        runner.run_rule(Arc::clone(&rule), fire_at).await;

        let finished = Utc::now();
        let skipped = skipped_triggers(&rule.schedule, fire_at, finished);
        if skipped > 0 {
            warn!(
                rule = %rule.name,
                skipped,
                "run outlasted its interval, skipping overlapped triggers"
            );
            entry.stats.record_skipped(skipped as u64);
        }
        after = finished.max(fire_at);
    }

    debug!(rule = %rule.name, "rule timer stopped");
}
