//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;

/// Sanitize filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Option<Regex>> = OnceLock::new();

    match INVALID_CHARS.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\s]"#).ok()) {
        Some(re) => re.replace_all(filename, "_").to_string(),
        None => filename.to_string(),
    }
}

/// Truncate text to a maximum number of characters
///
/// Used to keep provider error bodies readable in logs and `ErrorInfo`.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Carrier prefix of a flight number (`"TR875"` -> `"TR"`)
///
/// Returns an empty string when the input does not start with a two
/// character IATA designator followed by digits.
pub fn carrier_prefix(flight_number: &str) -> String {
    static FLIGHT_RE: OnceLock<Option<Regex>> = OnceLock::new();

    let normalized = flight_number.trim().to_uppercase();
    FLIGHT_RE
        .get_or_init(|| Regex::new(r"^([A-Z0-9]{2})\d{1,4}[A-Z]?$").ok())
        .as_ref()
        .and_then(|re| re.captures(&normalized))
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .unwrap_or_default()
}
