//! Client error types.

use std::fmt;

use oscq_discovery::DiscoveryError;
use oscq_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Transport or responder failure.
    Server(ServerError),
    /// Discovery or endpoint negotiation failure.
    Discovery(DiscoveryError),
    /// A subscriber failed while handling an event.
    Handler(String),
    /// A command-line value could not be parsed.
    InvalidArgument(String),
    /// No peer showed up in time.
    Timeout(String),
    /// The operation was cancelled.
    Cancelled,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Server(err) => write!(f, "server error: {}", err),
            Self::Discovery(err) => write!(f, "discovery error: {}", err),
            Self::Handler(msg) => write!(f, "event handler failed: {}", msg),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Server(err) => Some(err),
            Self::Discovery(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ServerError> for ClientError {
    fn from(err: ServerError) -> Self {
        Self::Server(err)
    }
}

impl From<DiscoveryError> for ClientError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err)
    }
}
