//! Core types for retrieved and parsed messages

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sender used when a message carries no usable `From:` header
pub const UNKNOWN_SENDER: &str = "Unknown";

/// One object pulled from the blob store, as text, plus the key it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    content: String,
    key: String,
}

impl RawMessage {
    pub fn new(content: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            key: key.into(),
        }
    }

    /// Build from stored bytes. Invalid UTF-8 sequences become U+FFFD.
    pub fn from_bytes(bytes: &[u8], key: impl Into<String>) -> Self {
        Self::new(String::from_utf8_lossy(bytes), key)
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Storage key; provenance only, never interpreted
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Opaque per-parse identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id, unrelated to the message content
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as handed to the display layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    /// Generated fresh for every parse
    pub id: MessageId,

    /// Best-effort sender, `"Unknown"` when absent
    pub from: String,

    /// Decoded subject, `None` when there is no `Subject:` header
    pub subject: Option<String>,

    /// Decoded plaintext body
    pub body: String,

    /// `Date:` header, or the time of parsing
    pub received_at: DateTime<Utc>,

    /// Key of the stored object this came from
    pub source_key: String,
}

impl ParsedMessage {
    /// Receipt time as `YYYY-MM-DDTHH:MM:SS.mmmZ`
    #[must_use]
    pub fn received_at_iso(&self) -> String {
        self.received_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Subject for display, empty when absent
    #[must_use]
    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {}",
            self.received_at_iso(),
            self.from,
            self.subject.as_deref().unwrap_or("(no subject)")
        )
    }
}

/// A registered disposable address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub id: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl AddressRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            address: address.into(),
            created_at: Utc::now(),
            is_active: true,
        }
    }
}
