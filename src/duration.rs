//! Parsing and formatting of timer amounts
//!
//! Deltas are written as an optional sign, a whole number and an optional
//! unit: `+5m`, `-1m`, `90s`, `-30`, `+1h`. A bare number is seconds.

use crate::error::{CourseTimersError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn delta_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([+-]?)\s*(\d+)\s*(h|m|s|hr|hrs|min|mins|sec|secs)?\s*$")
            .expect("delta pattern is valid")
    })
}

/// Parse a signed delta into seconds
///
/// # Errors
///
/// Returns [`CourseTimersError::InvalidDelta`] if the text does not match
/// or the amount overflows
///
/// # Examples
///
/// ```
/// use coursetimers::duration::parse_delta;
///
/// assert_eq!(parse_delta("+5m").unwrap(), 300);
/// assert_eq!(parse_delta("-90s").unwrap(), -90);
/// assert_eq!(parse_delta("-30").unwrap(), -30);
/// ```
pub fn parse_delta(text: &str) -> Result<i64> {
    let invalid = || CourseTimersError::InvalidDelta(text.to_string());
    let caps = delta_pattern()
        .captures(&text.to_ascii_lowercase())
        .ok_or_else(invalid)?
        .iter()
        .map(|m| m.map(|m| m.as_str().to_string()))
        .collect::<Vec<_>>();

    let amount: i64 = caps[2]
        .as_deref()
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(invalid)?;
    let scale = match caps[3].as_deref() {
        Some("h" | "hr" | "hrs") => 3600,
        Some("m" | "min" | "mins") => 60,
        _ => 1,
    };
    let seconds = amount.checked_mul(scale).ok_or_else(invalid)?;

    Ok(if caps[1].as_deref() == Some("-") {
        -seconds
    } else {
        seconds
    })
}

/// Format seconds as `H:MM:SS`, with a leading `-` when negative
pub fn format_hms(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Format a signed delta compactly, e.g. `+5m`, `-1h 30s`, `0s`
pub fn format_delta(seconds: i64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let sign = if seconds < 0 { "-" } else { "+" };
    let total = seconds.unsigned_abs();
    let parts: Vec<String> = [(total / 3600, "h"), ((total % 3600) / 60, "m"), (total % 60, "s")]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();
    format!("{}{}", sign, parts.join(" "))
}
