//! Alert rule definitions and their runtime building blocks.
//!
//! This crate provides:
//! - YAML rule schema with serde deserialization
//! - Filesystem loader (single file or recursive directory)
//! - Rule initialization: schedule, templates, throttle period, decision procedure
//! - Search template rendering via minijinja
//! - Per-rule throttle guard
//! - Per-rule cron scheduler

pub mod loader;
pub mod rule;
pub mod scheduler;
pub mod schema;
pub mod templates;
pub mod throttle;

pub use rule::{InitError, Rule};
pub use scheduler::{RuleRunner, RuleScheduler};
pub use throttle::{ThrottleDecision, ThrottleGuard, ThrottlePermit};
