//! Transport and responder configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use oscq_protocol::MAX_DATAGRAM_SIZE;

/// UDP transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Receive buffer size; longer datagrams are truncated.
    pub buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the receive buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

/// HTTP responder configuration.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Address the responder listens on.
    pub bind: SocketAddr,
    /// Name reported in the host-info document.
    pub service_name: String,
    /// OSC receive endpoint reported in the host-info document.
    pub osc_endpoint: SocketAddr,
}

impl ResponderConfig {
    pub fn new(service_name: impl Into<String>, bind: SocketAddr, osc_endpoint: SocketAddr) -> Self {
        Self {
            bind,
            service_name: service_name.into(),
            osc_endpoint,
        }
    }

    /// A responder on loopback for a receiver on loopback.
    pub fn localhost(service_name: impl Into<String>, http_port: u16, osc_port: u16) -> Self {
        let address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self::new(
            service_name,
            SocketAddr::new(address, http_port),
            SocketAddr::new(address, osc_port),
        )
    }
}
