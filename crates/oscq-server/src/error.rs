//! Server error types.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the transport and the HTTP responder.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error outside of binding or connecting.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The send socket could not be connected.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Protocol error (document encoding).
    #[error("Protocol error: {0}")]
    Protocol(#[from] oscq_protocol::ProtocolError),
}

impl ServerError {
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub fn connect(addr: SocketAddr, source: io::Error) -> Self {
        Self::Connect { addr, source }
    }
}
