//! Cron normalization, trigger arithmetic, and throttle period parsing.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Upper bound when counting trigger instants swallowed by a long run.
const MAX_SKIPPED_COUNT: usize = 10_000;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Rule files may use standard 5-field cron: `min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(cron_5field: &str) -> String {
    let trimmed = cron_5field.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6/7-field or non-standard; let the parser decide.
        trimmed.to_string()
    }
}

/// Parse a rule interval into a [`Schedule`], normalizing 5-field forms first.
pub fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron(expr))
}

/// First trigger instant strictly after `after`.
pub fn next_trigger(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Count trigger instants in `(fired_at, finished]`.
///
/// These are the triggers that arrived while the run started at `fired_at`
/// was still in progress, and which the scheduler skips.
pub fn skipped_triggers(
    schedule: &Schedule,
    fired_at: DateTime<Utc>,
    finished: DateTime<Utc>,
) -> usize {
    schedule
        .after(&fired_at)
        .take_while(|t| *t <= finished)
        .take(MAX_SKIPPED_COUNT)
        .count()
}

/// Parse a compact throttle period: `<integer><unit>` with unit `s`, `m` or `h`.
///
/// Returns `None` for an empty string, an unknown unit, or a prefix that is
/// not a non-negative integer. Surrounding whitespace is not accepted.
pub fn parse_cooldown(s: &str) -> Option<Duration> {
    let unit = s.chars().last()?;
    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        _ => return None,
    };

    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: u64 = digits.parse().ok()?;
    n.checked_mul(multiplier).map(Duration::from_secs)
}
