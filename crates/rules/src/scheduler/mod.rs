//! Per-rule cron scheduling.
//!
//! Every rule gets its own tokio task that sleeps until the rule's next
//! trigger instant and then hands the rule to a [`RuleRunner`]. A slow run
//! only delays its own rule: the task awaits the run, and trigger instants
//! that elapse in the meantime are skipped (counted and logged), never queued
//! and never run concurrently with the in-flight run.
//!
//! This module does NOT know how a run is executed. The runner crate wires
//! its execution orchestrator in through the [`RuleRunner`] trait.

mod core;
pub(crate) mod cron;
mod entry;


pub use self::core::{RuleRunner, RuleScheduler};
pub(crate) use self::cron::normalize_cron;
pub use self::cron::{next_trigger, parse_cooldown, parse_schedule, skipped_triggers};
pub use self::entry::{RuleScheduleEntry, ScheduleStats};
