//! Provider response parsing
//!
//! This module turns validated API responses into [`FlightInfo`] records.
//! Outbound responses become one candidate per item; inbound responses are
//! combined with the outbound candidate they were requested for.

pub mod provider;

pub use provider::ProviderJsonParser;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::crawler::client::ApiResponse;
use crate::models::FlightInfo;
use crate::utils::error::ParseError;

/// Converts provider responses into flight records
pub trait FlightParser: Send + Sync {
    /// Outbound candidates in response order
    ///
    /// A null `data` yields an empty list; any other non-array `data` is an
    /// error. Malformed items are skipped.
    fn parse_outbound(&self, response: &ApiResponse) -> Result<Vec<FlightInfo>, ParseError>;

    /// Round-trip records combining `outbound` with each inbound item
    fn parse_inbound(
        &self,
        response: &ApiResponse,
        outbound: &FlightInfo,
    ) -> Result<Vec<FlightInfo>, ParseError>;
}

/// Parse a provider date
///
/// Accepted forms: `2025-07-21`, `20250721` and `7月21日`. The last one has
/// no year; it takes the year of `reference`, or the following year when that
/// would put it more than a month before `reference`.
pub fn parse_provider_date(raw: &str, reference: NaiveDate) -> Result<NaiveDate, ParseError> {
    static MONTH_DAY_RE: OnceLock<Option<Regex>> = OnceLock::new();

    let raw = raw.trim();
    let invalid = || ParseError::InvalidDate(raw.to_string());

    if raw.is_empty() {
        return Err(invalid());
    }

    if raw.contains('-') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid());
    }

    if raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|_| invalid());
    }

    let re = MONTH_DAY_RE
        .get_or_init(|| Regex::new(r"(\d{1,2})月(\d{1,2})日").ok())
        .as_ref()
        .ok_or_else(invalid)?;
    let caps = re.captures(raw).ok_or_else(invalid)?;
    let month: u32 = caps[1].parse().map_err(|_| invalid())?;
    let day: u32 = caps[2].parse().map_err(|_| invalid())?;

    let this_year = NaiveDate::from_ymd_opt(reference.year(), month, day).ok_or_else(invalid)?;
    if (reference - this_year).num_days() > 31 {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day).ok_or_else(invalid)
    } else {
        Ok(this_year)
    }
}
