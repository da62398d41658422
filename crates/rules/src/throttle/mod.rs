//! Per-rule cooldown tracking.
//!
//! The [`ThrottleGuard`] owns every rule's [`ThrottleState`] and is its only
//! writer. Each rule has its own lock, so unrelated rules never contend; the
//! map of locks is only write-locked when a rule is registered.
//!
//! The gate is a critical section, not a check: [`ThrottleGuard::acquire`]
//! hands out a [`ThrottlePermit`] that holds the rule's lock until the caller
//! either records a successful dispatch or drops the permit. Two overlapping
//! runs of the same rule therefore cannot both pass the gate for one window.

mod guard;

#[cfg(test)]
mod tests;

pub use self::guard::{ThrottleDecision, ThrottleGuard, ThrottlePermit, ThrottleState};
