//! Core error types.

use thiserror::Error;

/// Error returned by an event subscriber.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building a specialised message from a plain one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The address does not start with the parameter prefix.
    #[error("address is not a parameter: {address}")]
    NotAParameter { address: String },

    /// The message has no first argument, or it is absent.
    #[error("message has no value argument: {address}")]
    MissingArgument { address: String },
}

impl MessageError {
    /// Creates a not-a-parameter error.
    pub fn not_a_parameter(address: impl Into<String>) -> Self {
        Self::NotAParameter {
            address: address.into(),
        }
    }

    /// Creates a missing-argument error.
    pub fn missing_argument(address: impl Into<String>) -> Self {
        Self::MissingArgument {
            address: address.into(),
        }
    }
}
