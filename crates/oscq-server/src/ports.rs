//! Ephemeral port allocation.
//!
//! Binds a throwaway socket to port 0 on loopback and reports the port the OS
//! picked. The socket is released before the caller binds for real, so another
//! process can take the port in between; the caller's bind error is where that
//! shows up.

use std::net::{Ipv4Addr, SocketAddr, TcpListener, UdpSocket};

use tracing::trace;

use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Tcp,
    Udp,
}

/// Returns a port that was free a moment ago.
pub fn available_port(kind: PortKind) -> ServerResult<u16> {
    let probe = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let local = match kind {
        PortKind::Tcp => TcpListener::bind(probe).and_then(|s| s.local_addr()),
        PortKind::Udp => UdpSocket::bind(probe).and_then(|s| s.local_addr()),
    }
    .map_err(|e| ServerError::bind(probe, e))?;

    trace!(?kind, port = local.port(), "Allocated ephemeral port");
    Ok(local.port())
}
