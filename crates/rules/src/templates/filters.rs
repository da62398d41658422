//! Filters and globals available to search templates.

use std::fmt::Write;

use chrono::DateTime;
use minijinja::{Error, ErrorKind};

/// Build a configured minijinja environment with custom filters and globals.
pub(super) fn build_env() -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.add_filter("strftime", strftime_filter);
    env.add_function("env", env_function);
    env
}

/// Custom filter: format an RFC 3339 timestamp with a chrono format string.
///
/// `{{ time | strftime('%Y.%m.%d') }}` renders `2026.02.16`.
fn strftime_filter(value: String, format: String) -> Result<String, Error> {
    let parsed = DateTime::parse_from_rfc3339(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("strftime expects an RFC 3339 timestamp, got '{value}': {e}"),
        )
    })?;

    let mut out = String::new();
    write!(out, "{}", parsed.format(&format)).map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid strftime format '{format}'"),
        )
    })?;
    Ok(out)
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
