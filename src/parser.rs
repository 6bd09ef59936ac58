//! Raw message parser
//!
//! A [`Parser`] holds an ordered list of fallible [`ParseStrategy`]s and
//! tries them in turn. The manual line-scanning parse in [`parse_manual`]
//! never fails and closes every chain, so [`Parser::parse`] is total.

use crate::decode::decode_base64_or_raw;
use crate::error::{ParseError, Result};
use crate::headers::{extract_received_at, extract_sender, extract_subject, is_base64_body};
use crate::split::split;
use crate::types::{MessageId, ParsedMessage, RawMessage};
use chrono::Utc;
use regex::Regex;
use tracing::debug;

static HTML_TAG: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// One way of turning a raw message into a [`ParsedMessage`]
pub trait ParseStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn parse(&self, raw: &RawMessage) -> Result<ParsedMessage>;
}

/// Ordered strategy chain with the manual parse as the final fallback
pub struct Parser {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl Parser {
    pub fn new(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    /// Only the manual line-scanning parse
    #[must_use]
    pub fn manual() -> Self {
        Self::new(Vec::new())
    }

    /// Names of the configured strategies, in order, excluding the fallback
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Parse a message. Never fails.
    #[must_use]
    pub fn parse(&self, raw: &RawMessage) -> ParsedMessage {
        for strategy in &self.strategies {
            match strategy.parse(raw) {
                Ok(message) => {
                    debug!(
                        strategy = strategy.name(),
                        key = raw.key(),
                        "Parsed message from {}",
                        message.from
                    );
                    return message;
                }
                Err(e) => {
                    debug!(
                        strategy = strategy.name(),
                        key = raw.key(),
                        error = %e,
                        "Parse strategy failed, trying next"
                    );
                }
            }
        }

        parse_manual(raw)
    }
}

impl Default for Parser {
    /// MIME-aware parse first, manual parse as fallback
    fn default() -> Self {
        Self::new(vec![Box::new(MimeStrategy)])
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

/// Parse with [`Parser::default`]
#[must_use]
pub fn parse_message(raw: &RawMessage) -> ParsedMessage {
    Parser::default().parse(raw)
}

/// Line-scanning parse that always succeeds.
///
/// The body is only the first line of the body region, base64-decoded when
/// `Content-Transfer-Encoding: base64` is present. Without a header/body
/// boundary the whole input becomes the body.
#[must_use]
pub fn parse_manual(raw: &RawMessage) -> ParsedMessage {
    let content = raw.content();

    ParsedMessage {
        id: MessageId::generate(),
        from: extract_sender(content),
        subject: extract_subject(content),
        body: extract_manual_body(content),
        received_at: extract_received_at(content, Utc::now()),
        source_key: raw.key().to_string(),
    }
}

/// Body for the manual parse
#[must_use]
pub fn extract_manual_body(content: &str) -> String {
    let sections = split(content);
    if !sections.has_boundary {
        return content.to_string();
    }

    let first_line = sections
        .body
        .trim()
        .split('\n')
        .next()
        .unwrap_or_default()
        .trim();

    if is_base64_body(content) {
        decode_base64_or_raw(first_line)
    } else {
        first_line.to_string()
    }
}

/// MIME-aware body parse backed by `mailparse`.
///
/// Header fields come from the same line-scanning extractors as the manual
/// parse, so subjects unfold identically on both paths. Fails when the
/// message has no header/body boundary, when `mailparse` rejects the
/// structure, or when a body part cannot be transfer-decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeStrategy;

impl ParseStrategy for MimeStrategy {
    fn name(&self) -> &'static str {
        "mime"
    }

    fn parse(&self, raw: &RawMessage) -> Result<ParsedMessage> {
        let content = raw.content();
        if !split(content).has_boundary {
            return Err(ParseError::Structure(
                "no blank line between headers and body".into(),
            ));
        }

        let parsed = mailparse::parse_mail(content.as_bytes())
            .map_err(|e| ParseError::Structure(e.to_string()))?;
        let body = extract_mime_body(&parsed)?;

        let from = extract_sender(content);
        let subject = extract_subject(content);
        let received_at = extract_received_at(content, Utc::now());

        Ok(ParsedMessage {
            id: MessageId::generate(),
            from,
            subject,
            body,
            received_at,
            source_key: raw.key().to_string(),
        })
    }
}

/// Full plain-text part, else tag-stripped HTML part, else empty
fn extract_mime_body(parsed: &mailparse::ParsedMail) -> Result<String> {
    let (text, html) = extract_body_parts(parsed)?;

    let text = text.trim_end_matches(['\r', '\n']);
    if !text.is_empty() {
        return Ok(text.to_string());
    }

    Ok(html.map(|h| strip_html(&h)).unwrap_or_default())
}

fn extract_body_parts(parsed: &mailparse::ParsedMail) -> Result<(String, Option<String>)> {
    let mut text = String::new();
    let mut html: Option<String> = None;

    if parsed.subparts.is_empty() {
        let body = part_body(parsed)?;
        if parsed.ctype.mimetype.to_lowercase().contains("text/html") {
            html = Some(body);
        } else {
            text = body;
        }
    } else {
        extract_body_recursive(parsed, &mut text, &mut html)?;
    }

    Ok((text, html))
}

fn extract_body_recursive(
    parsed: &mailparse::ParsedMail,
    text: &mut String,
    html: &mut Option<String>,
) -> Result<()> {
    for part in &parsed.subparts {
        let content_type = part.ctype.mimetype.to_lowercase();

        if !part.subparts.is_empty() {
            extract_body_recursive(part, text, html)?;
        } else if content_type.contains("text/plain") && text.is_empty() {
            *text = part_body(part)?;
        } else if content_type.contains("text/html") && html.is_none() {
            *html = Some(part_body(part)?);
        }
    }

    Ok(())
}

fn part_body(part: &mailparse::ParsedMail) -> Result<String> {
    part.get_body()
        .map_err(|e| ParseError::Decode(e.to_string()))
}

/// Remove every `<...>` tag and trim
#[must_use]
pub fn strip_html(html: &str) -> String {
    HTML_TAG.replace_all(html, "").trim().to_string()
}
