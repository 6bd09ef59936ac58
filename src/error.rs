//! Error types for message parsing, storage and address issuing

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised inside a single parsing strategy.
///
/// These never escape [`crate::Parser::parse`]; they only tell the parser to
/// move on to the next strategy in its chain.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Failed to parse the message structure
    #[error("Failed to parse message structure: {0}")]
    Structure(String),

    /// Failed to decode message content
    #[error("Failed to decode content: {0}")]
    Decode(String),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
}

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors from a blob store or an address registry backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error with the associated path
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No object stored under this key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from issuing a new disposable address
#[derive(Error, Debug)]
pub enum AddressError {
    /// The generated address is already registered
    #[error("Email address already exists: {0}")]
    AddressTaken(String),

    /// The registry refused the write
    #[error("Failed to create email address: {0}")]
    Registry(#[from] StoreError),
}
