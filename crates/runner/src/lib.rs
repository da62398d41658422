//! Alert execution pipeline.
//!
//! [`Orchestrator`] drives one run of a rule through render, search,
//! evaluation, throttle gate and dispatch. It implements
//! [`RuleRunner`](esalert_rules::RuleRunner) so the scheduler can fire it.

pub mod error;
pub mod orchestrator;
pub mod outcome;

pub use error::RunError;
pub use orchestrator::{parse_run_timeout, report_outcome, Orchestrator};
pub use outcome::RunOutcome;
