//! Provider date and time handling
//!
//! The CLP API reports timestamps in compact local formats and expects
//! request dates in Hong Kong local time. Everything here that depends on
//! the current time takes `now` as an argument so callers can pin the clock.

use crate::error::{FulmenError, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Asia::Hong_Kong;
use chrono_tz::Tz;

/// Time zone of the provider's local timestamps
pub const PROVIDER_TZ: Tz = Hong_Kong;

const COMPACT_DATETIME: &str = "%Y%m%d%H%M%S";
const COMPACT_DATE: &str = "%Y%m%d";
const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Current wall-clock time in the provider's time zone
pub fn provider_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&PROVIDER_TZ)
}

/// Parse a compact `YYYYMMDDHHMMSS` timestamp
pub fn parse_compact_datetime(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, COMPACT_DATETIME)
        .map_err(|e| FulmenError::parse(format!("invalid provider timestamp '{}': {}", value, e)))
}

/// Parse a compact `YYYYMMDD` date
pub fn parse_compact_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, COMPACT_DATE)
        .map_err(|e| FulmenError::parse(format!("invalid provider date '{}': {}", value, e)))
}

/// Parse an explicitly-optional compact timestamp; empty or absent maps to None
pub fn parse_optional_compact_datetime(value: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match value {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => parse_compact_datetime(s).map(Some),
    }
}

/// Parse the access-token expiry string supplied by the provider (UTC)
pub fn parse_expiry(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, EXPIRY_FORMAT)
        .map_err(|e| FulmenError::parse(format!("invalid token expiry '{}': {}", value, e)))?;
    Ok(naive.and_utc())
}

/// Format a request date as `YYYYMMDD000000`
pub fn format_request_date(date: DateTime<Tz>) -> String {
    format!("{}000000", date.format(COMPACT_DATE))
}

/// Format a request date as `MM/DD/YYYY` (renewable dashboard endpoint)
pub fn format_us_date(date: DateTime<Tz>) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Reference dates used to build consumption history requests
#[derive(Debug, Clone)]
pub struct ReferenceDates {
    pub today: DateTime<Tz>,
    pub this_month: DateTime<Tz>,
    pub next_month: DateTime<Tz>,
    pub fourteen_months_ago: DateTime<Tz>,
}

impl ReferenceDates {
    /// Compute the reference dates for a given wall-clock instant
    pub fn from_now(now: DateTime<Tz>) -> Self {
        let first_of_month = now.with_day(1).unwrap_or(now);
        let next_month = first_of_month
            .checked_add_months(Months::new(1))
            .unwrap_or(first_of_month);

        // One year and two months back, day-of-month restored to today's where
        // the target month allows it.
        let clamped = now.checked_sub_months(Months::new(14)).unwrap_or(now);
        let fourteen_months_ago = clamped.with_day(now.day()).unwrap_or(clamped);

        Self {
            today: now,
            this_month: first_of_month,
            next_month,
            fourteen_months_ago,
        }
    }
}

/// One calendar-day request window for the hourly fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourlyWindow {
    pub from: DateTime<Tz>,
    pub to: DateTime<Tz>,
}

/// Day windows for the hourly fetch, oldest first.
///
/// Between 00:00 and 04:00 local time the provider has not yet settled data
/// for "today", so the whole window is shifted one calendar day earlier.
pub fn hourly_windows(now: DateTime<Tz>, lookback_days: u32) -> Vec<HourlyWindow> {
    let shift = if now.time().hour() < 4 { 1 } else { 0 };

    (1..=lookback_days)
        .map(|i| {
            let back = i64::from(lookback_days - i + shift);
            let from = now - Duration::days(back);
            let to = from + Duration::days(1);
            HourlyWindow { from, to }
        })
        .collect()
}
