use chrono::{DateTime, NaiveDate};

use crate::error::AppError;

pub const ISO_DATE: &str = "%Y-%m-%d";

/// Parses a stored date into a plain calendar date.
///
/// Accepts `YYYY-MM-DD` as well as full RFC 3339 timestamps. Timestamps keep
/// the calendar date they were written with; they are never shifted into
/// another zone, so `2024-03-01T23:30:00-05:00` stays on March 1st.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, AppError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE) {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.date_naive())
        .map_err(|_| AppError::validation(format!("malformed date: {raw:?}")))
}

pub fn iso(date: NaiveDate) -> String {
    date.format(ISO_DATE).to_string()
}

pub fn display(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}
