//! Error types for discovery and endpoint negotiation.

use std::fmt;
use thiserror::Error;

/// The category of a discovery error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryErrorCode {
    /// HTTP request failed: connection refused, timeout, DNS.
    NetworkError,
    /// Peer answered with an unexpected status or a malformed document.
    InvalidResponse,
    /// The multicast daemon failed to start, advertise, or query.
    MulticastError,
    /// Invalid configuration, e.g. an HTTP client that cannot be built.
    ConfigurationError,
    /// Unexpected state.
    InternalError,
}

impl DiscoveryErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::MulticastError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::MulticastError => "multicast_error",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for DiscoveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while discovering or negotiating with a peer.
#[derive(Debug, Error)]
pub struct DiscoveryError {
    code: DiscoveryErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DiscoveryError {
    pub fn new(code: DiscoveryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorCode::NetworkError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorCode::InvalidResponse, message)
    }

    pub fn multicast(message: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorCode::MulticastError, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(DiscoveryErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> DiscoveryErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_includes_code() {
        let err = DiscoveryError::invalid_response("missing OSC_PORT");
        assert_eq!(err.to_string(), "invalid_response: missing OSC_PORT");
        assert_eq!(err.code(), DiscoveryErrorCode::InvalidResponse);
    }

    #[test]
    fn retryable_codes() {
        assert!(DiscoveryError::network("timeout").is_retryable());
        assert!(DiscoveryError::multicast("socket").is_retryable());
        assert!(!DiscoveryError::invalid_response("json").is_retryable());
        assert!(!DiscoveryError::configuration("client").is_retryable());
    }

    #[test]
    fn source_is_kept() {
        let io = std::io::Error::other("boom");
        let err = DiscoveryError::network("request failed").with_source(io);
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }
}
