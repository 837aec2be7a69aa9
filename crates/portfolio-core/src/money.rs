//! Amount parsing and display.
//!
//! Brokerage exports format numbers for people, not programs. [`parse_amount`]
//! accepts this grammar:
//!
//! ```text
//! amount  := blank | signed | "(" signed ")"
//! signed  := ["+" | "-"] ["$"] digits ["%"]
//! digits  := decimal with optional "," thousands separators
//! blank   := "" | "--" | "n/a" | "na" | "none"      (case-insensitive)
//! ```
//!
//! A parenthesized amount is negative. A trailing `%` is dropped without
//! rescaling, so `"5%"` parses to `5.0`.

use rust_decimal::prelude::*;

use crate::error::{PortfolioError, Result};

const BLANK_TOKENS: &[&str] = &["", "--", "n/a", "na", "none"];

/// Parse a display-formatted amount. Blank tokens yield `Ok(None)`.
pub fn parse_amount(text: &str) -> Result<Option<f64>> {
    let trimmed = text.trim();
    if BLANK_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) {
        return Ok(None);
    }

    let (parenthesized, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, trimmed),
    };

    let mut cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.ends_with('%') {
        cleaned.pop();
    }
    if let Some(rest) = cleaned.strip_prefix('+') {
        cleaned = rest.to_string();
    }

    let invalid = || PortfolioError::InvalidAmount(text.to_string());
    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| invalid())?;
    let value = if parenthesized { -value.abs() } else { value };

    value.to_f64().map(Some).ok_or_else(invalid)
}

/// Lenient variant for optional columns: blanks and garbage become `default`.
pub fn amount_or(text: &str, default: f64) -> f64 {
    match parse_amount(text) {
        Ok(Some(value)) => value,
        _ => default,
    }
}

fn round_half_up(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to whole cents, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    round_half_up(value, 2).to_f64().unwrap_or(value)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `$1,234.57`, with negatives rendered as `-$1,234.57`.
pub fn format_currency(value: f64) -> String {
    let rounded = round_half_up(value, 2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}${}.{frac}", group_thousands(whole))
}

/// Fraction to percent text: `0.1234` -> `12.34%`.
pub fn format_pct(value: f64) -> String {
    format!("{:.2}%", round_half_up(value * 100.0, 2))
}
