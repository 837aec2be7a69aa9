use chrono::NaiveDate;

use crate::error::{PortfolioError, Result};

/// Formats seen across brokerage exports, tried in order. Two-digit years go
/// first since chrono's `%Y` would happily read `24` as year 24.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%d-%b-%Y", "%b %d %Y"];

pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PortfolioError::InvalidDate("date value is required".to_string()));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| PortfolioError::InvalidDate(format!("unsupported date format: {text:?}")))
}

/// Absolute calendar-day distance.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

pub fn within_days(target: NaiveDate, reference: NaiveDate, days: i64) -> bool {
    days_between(target, reference) <= days
}
