//! Per-rule schedule entry type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::rule::Rule;

/// Counters maintained by a rule's timer task.
#[derive(Debug, Default)]
pub struct ScheduleStats {
    runs: AtomicU64,
    skipped: AtomicU64,
}

impl ScheduleStats {
    /// Number of runs started by the timer.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Number of trigger instants skipped because a run was still in flight.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub(crate) fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self, n: u64) {
        self.skipped.fetch_add(n, Ordering::Relaxed);
    }
}

/// Scheduling state for a single rule.
#[derive(Debug, Clone)]
pub struct RuleScheduleEntry {
    pub rule: Arc<Rule>,
    pub stats: Arc<ScheduleStats>,
}
