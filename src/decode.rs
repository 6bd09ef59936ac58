//! Decoding helpers: base64 text, encoded-word subjects and dates
//!
//! Every decoder that can fail is expressed as an ordered chain of
//! strategies. The first strategy that succeeds wins; callers supply the
//! final infallible value (the raw input, or the current time).

use crate::error::{ParseError, Result};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Standard alphabet, padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

type Strategy<T> = fn(&str) -> Result<T>;

const DATE_STRATEGIES: &[(&str, Strategy<DateTime<Utc>>)] = &[
    ("rfc2822", parse_rfc2822),
    ("rfc3339", parse_rfc3339),
    ("naive-iso", parse_naive_iso),
    ("lenient", parse_lenient),
];

/// Run `strategies` in order and return the first success
fn first_success<T>(input: &str, strategies: &[(&str, Strategy<T>)]) -> Option<T> {
    strategies
        .iter()
        .find_map(|(name, strategy)| match strategy(input) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(strategy = name, error = %e, "Decode strategy failed");
                None
            }
        })
}

/// Decode base64 into UTF-8 text. Invalid base64 or invalid UTF-8 is an error.
pub fn decode_base64_text(encoded: &str) -> Result<String> {
    let bytes = LENIENT_BASE64
        .decode(encoded.trim())
        .map_err(|e| ParseError::Decode(format!("base64: {e}")))?;

    String::from_utf8(bytes).map_err(|e| ParseError::Decode(format!("utf-8: {e}")))
}

/// Decode a base64 line, keeping the line unchanged if it does not decode
#[must_use]
pub fn decode_base64_or_raw(line: &str) -> String {
    first_success(line, &[("base64", decode_base64_text)]).unwrap_or_else(|| line.to_string())
}

/// Decode a subject written as a single `=?charset?B?payload?=` encoded-word.
///
/// Only the `B` marker is understood, and the charset label is ignored: the
/// payload is always read as UTF-8. Anything else is returned unchanged.
#[must_use]
pub fn decode_encoded_word(value: &str) -> String {
    if !value.starts_with("=?") {
        return value.to_string();
    }

    let parts: Vec<&str> = value.split('?').collect();
    if parts.len() < 4 || parts[2] != "B" {
        return value.to_string();
    }

    match decode_base64_text(parts[3]) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(error = %e, "Failed to decode subject");
            value.to_string()
        }
    }
}

/// Parse a `Date:` header value, trying each known format in turn
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    first_success(value, DATE_STRATEGIES)
        .ok_or_else(|| ParseError::InvalidDate(value.to_string()))
}

/// Parse a date, or fall back to `now` when absent or unparseable
#[must_use]
pub fn parse_date_or(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    value.and_then(|v| parse_date(v).ok()).unwrap_or(now)
}

fn parse_rfc2822(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ParseError::InvalidDate(format!("{value}: {e}")))
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ParseError::InvalidDate(format!("{value}: {e}")))
}

/// `2025-01-01T12:00:00` or `2025-01-01`, read as UTC
fn parse_naive_iso(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map(|naive| naive.and_utc())
        .map_err(|e| ParseError::InvalidDate(format!("{value}: {e}")))
}

/// mailparse's forgiving RFC 2822 reader (tolerates bad weekdays, comments)
fn parse_lenient(value: &str) -> Result<DateTime<Utc>> {
    let timestamp =
        mailparse::dateparse(value).map_err(|e| ParseError::InvalidDate(format!("{value}: {e}")))?;

    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| ParseError::InvalidDate(format!("{value}: out of range")))
}
