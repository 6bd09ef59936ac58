//! Line-scanning header extractors
//!
//! Each extractor scans the whole raw text, not just the header block, and
//! matches header names case-sensitively at the start of a line. The first
//! match wins.

use crate::decode::{decode_encoded_word, parse_date_or};
use crate::types::UNKNOWN_SENDER;
use chrono::{DateTime, Utc};
use regex::Regex;

static HEADER_LINE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[A-Za-z-]+:(?:\s|$)").unwrap());

/// Value of the first line starting with `name:` (e.g. `"From"`), untrimmed
#[must_use]
pub fn first_header_line<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.lines()
        .find_map(|line| line.strip_prefix(name).and_then(|rest| rest.strip_prefix(':')))
}

/// Sender from the first `From:` line, or `"Unknown"`
#[must_use]
pub fn extract_sender(raw: &str) -> String {
    first_header_line(raw, "From")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_SENDER)
        .to_string()
}

/// Unfolded subject from the first `Subject:` line, before any decoding.
///
/// Continuation lines are consumed until the next header line, a blank line
/// or the end of input. Each line break and the whitespace after it is
/// dropped, so `"Hel\r\n lo"` unfolds to `"Hello"`.
#[must_use]
pub fn extract_raw_subject(raw: &str) -> Option<String> {
    let mut lines = raw.lines();
    let first = lines.find_map(|line| line.strip_prefix("Subject:"))?;

    let mut subject = first.trim_start().to_string();
    for line in lines {
        if line.is_empty() || HEADER_LINE.is_match(line) {
            break;
        }
        subject.push_str(line.trim_start());
    }

    Some(subject)
}

/// Subject unfolded and, when it is a `B` encoded-word, decoded
#[must_use]
pub fn extract_subject(raw: &str) -> Option<String> {
    extract_raw_subject(raw).map(|subject| decode_encoded_word(&subject))
}

/// Time from the first `Date:` line, or `now` if absent or unparseable
#[must_use]
pub fn extract_received_at(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    parse_date_or(first_header_line(raw, "Date"), now)
}

/// Whether the first `Content-Transfer-Encoding:` line says `base64`
#[must_use]
pub fn is_base64_body(raw: &str) -> bool {
    first_header_line(raw, "Content-Transfer-Encoding")
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("base64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_line_pattern() {
        assert!(HEADER_LINE.is_match("To: someone"));
        assert!(HEADER_LINE.is_match("X-Empty:"));
        assert!(HEADER_LINE.is_match("Content-Type:\ttext/plain"));
        assert!(!HEADER_LINE.is_match(" continued: value"));
        assert!(!HEADER_LINE.is_match("http://example.com"));
        assert!(!HEADER_LINE.is_match("plain text"));
    }

    #[test]
    fn test_first_header_line_needs_colon() {
        assert_eq!(first_header_line("Fromage\nFrom: a", "From"), Some(" a"));
        assert_eq!(first_header_line("Date x", "Date"), None);
    }
}
