//! OSC wire codec and OSCQuery documents

pub mod codec;
pub mod documents;
pub mod error;

pub use codec::{encoded_len, parse, serialize, try_parse};
pub use documents::{
    ACCESS_NONE, ACCESS_READ, ACCESS_READ_WRITE, ACCESS_WRITE, Extensions, HostInfo, OscNode,
    address_space,
};
pub use error::{ProtocolError, ProtocolResult};

/// Receive buffer size; larger datagrams are truncated by the socket.
pub const MAX_DATAGRAM_SIZE: usize = 4096;
