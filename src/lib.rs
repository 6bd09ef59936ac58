// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Disposable Inbox
//!
//! Issues throwaway email addresses and reads the mail delivered to them out
//! of object storage. The heart of the crate is a forgiving raw message
//! parser that never fails: malformed input degrades individual fields to
//! defaults instead of producing an error.
//!
//! # Features
//!
//! - MIME-aware parsing via `mailparse`, with a line-scanning fallback
//! - Folded and base64 encoded-word subjects
//! - Base64 transfer-encoded bodies
//! - `YYMMDDNNN@domain` address issuing with duplicate checks
//! - Blob store scanning with a cooldown-gated poller
//!
//! # Example
//!
//! ```rust
//! use burner_inbox::{RawMessage, parse_message};
//!
//! let raw = RawMessage::new(
//!     "From: sender@example.com\r\nSubject: Hello\r\n\r\nBody",
//!     "email/abc",
//! );
//! let message = parse_message(&raw);
//!
//! assert_eq!(message.from, "sender@example.com");
//! assert_eq!(message.subject.as_deref(), Some("Hello"));
//! assert_eq!(message.body, "Body");
//! ```

pub mod address;
pub mod config;
pub mod decode;
mod error;
pub mod filter;
pub mod headers;
pub mod inbox;
mod parser;
pub mod split;
pub mod store;
mod types;

pub use address::{
    AddressRegistry, FileRegistry, MemoryRegistry, create_address, generate_address,
};
pub use error::{AddressError, ParseError, Result, StoreError};
pub use filter::is_addressed_to;
pub use inbox::{PollSettings, Poller, RefreshOutcome, Trigger, scan_inbox};
pub use parser::{
    MimeStrategy, ParseStrategy, Parser, extract_manual_body, parse_manual, parse_message,
    strip_html,
};
pub use store::{BlobStore, DirStore, MemoryStore};
pub use types::*;
