use crate::error::{DeployGuardError, Result};
use chrono::{DateTime, Utc};
use interim::{Dialect, parse_date_string};

/// Parse a time expression into a Unix timestamp (seconds)
/// Supports:
/// - Natural language: "1 hour ago", "yesterday"
/// - ISO 8601: "2024-01-01T00:00:00Z"
/// - Unix timestamp: "1704067200"
/// - "now"
pub fn parse_time(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(Utc::now().timestamp());
    }

    if let Ok(timestamp) = trimmed.parse::<i64>() {
        return Ok(timestamp);
    }

    if let Ok(dt) = parse_date_string(trimmed, Utc::now(), Dialect::Us) {
        return Ok(dt.timestamp());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp());
    }

    Err(DeployGuardError::DateParseError(format!(
        "Unable to parse time expression: '{}'",
        input
    )))
}

/// Current time in epoch milliseconds, the unit used on the event stream.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert an epoch-millisecond timestamp to a human-readable string
pub fn format_timestamp_millis(timestamp_ms: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("Invalid timestamp: {}", timestamp_ms),
    }
}

/// Keep the first five characters of a secret and star out the rest.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(5).collect();
    let hidden = secret.chars().count().saturating_sub(5);
    format!("{}{}", visible, "*".repeat(hidden))
}

/// Cut `text` to at most `max_chars` characters, marking the cut with "...".
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
