//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding datagrams or documents.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A string section has no null terminator.
    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },

    /// The tag list has no null terminator.
    #[error("unterminated tag list at offset {offset}")]
    UnterminatedTagList { offset: usize },

    /// The datagram ends inside an argument payload.
    #[error("truncated datagram: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// JSON document could not be encoded or decoded.
    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
