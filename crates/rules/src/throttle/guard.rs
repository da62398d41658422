//! [`ThrottleGuard`] and the permit handed out by its gate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Cooldown state of a single rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleState {
    /// Epoch seconds of the last fully successful dispatch, `None` if never.
    pub last_fired: Option<i64>,
    /// Minimum spacing between two successful dispatches.
    pub cooldown: Duration,
}

impl ThrottleState {
    /// Whether a dispatch at `now` (epoch seconds) is outside the cooldown window.
    pub fn allows(&self, now: i64) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.cooldown_secs(),
        }
    }

    /// Seconds left in the window at `now`, zero when open.
    pub fn remaining(&self, now: i64) -> u64 {
        match self.last_fired {
            None => 0,
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                self.cooldown_secs().saturating_sub(elapsed).max(0) as u64
            }
        }
    }

    fn cooldown_secs(&self) -> i64 {
        i64::try_from(self.cooldown.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Outcome of the throttle gate for one run.
#[derive(Debug)]
pub enum ThrottleDecision {
    /// The window is open; dispatch while holding the permit.
    Open(ThrottlePermit),
    /// Still inside the cooldown window; skip dispatch.
    Suppressed { remaining_secs: u64 },
}

/// Exclusive hold on one rule's throttle state.
///
/// Dropping the permit without calling [`record_fired`](Self::record_fired)
/// leaves the state untouched, so a failed dispatch never starts a window.
#[derive(Debug)]
pub struct ThrottlePermit {
    rule: String,
    state: OwnedMutexGuard<ThrottleState>,
}

impl ThrottlePermit {
    /// Record a fully successful dispatch at `timestamp` (epoch seconds).
    pub fn record_fired(mut self, timestamp: i64) {
        debug!(rule = %self.rule, timestamp, "throttle window started");
        self.state.last_fired = Some(timestamp);
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }
}

/// Owns cooldown state for every rule in the process.
#[derive(Debug, Default)]
pub struct ThrottleGuard {
    entries: RwLock<HashMap<String, Arc<Mutex<ThrottleState>>>>,
}

impl ThrottleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule with its cooldown, resetting it to "never fired".
    pub fn register(&self, rule: &str, cooldown: Duration) {
        let state = ThrottleState {
            last_fired: None,
            cooldown,
        };
        self.entries
            .write()
            .expect("throttle entries lock poisoned")
            .insert(rule.to_string(), Arc::new(Mutex::new(state)));
    }

    /// Enter the gate for `rule` at `now` (epoch seconds).
    ///
    /// Waits while another run of the same rule holds the permit. Rules that
    /// were never registered are treated as having no cooldown.
    pub async fn acquire(&self, rule: &str, now: i64) -> ThrottleDecision {
        let state = self.entry(rule).lock_owned().await;
        if state.allows(now) {
            ThrottleDecision::Open(ThrottlePermit {
                rule: rule.to_string(),
                state,
            })
        } else {
            ThrottleDecision::Suppressed {
                remaining_secs: state.remaining(now),
            }
        }
    }

    /// Whether a dispatch for `rule` at `now` would pass the gate.
    pub async fn should_fire(&self, rule: &str, now: i64) -> bool {
        self.entry(rule).lock().await.allows(now)
    }

    /// Record a successful dispatch for `rule` at `timestamp` (epoch seconds).
    pub async fn record_fired(&self, rule: &str, timestamp: i64) {
        self.entry(rule).lock().await.last_fired = Some(timestamp);
    }

    /// Snapshot of a rule's state, `None` for unknown rules.
    pub async fn state(&self, rule: &str) -> Option<ThrottleState> {
        let entry = self
            .entries
            .read()
            .expect("throttle entries lock poisoned")
            .get(rule)
            .cloned()?;
        let state = *entry.lock().await;
        Some(state)
    }

    /// Number of tracked rules.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("throttle entries lock poisoned")
            .len()
    }

    /// Whether no rules are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, rule: &str) -> Arc<Mutex<ThrottleState>> {
        if let Some(entry) = self
            .entries
            .read()
            .expect("throttle entries lock poisoned")
            .get(rule)
        {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write().expect("throttle entries lock poisoned");
        Arc::clone(entries.entry(rule.to_string()).or_default())
    }
}
