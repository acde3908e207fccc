//! OSC UDP transport and the OSCQuery HTTP responder

pub mod config;
pub mod error;
pub mod ports;
pub mod responder;
pub mod transport;

pub use config::{ResponderConfig, TransportConfig};
pub use error::{ServerError, ServerResult};
pub use ports::{PortKind, available_port};
pub use responder::DiscoveryResponder;
pub use transport::{Inbound, Transport, TransportEvents, TransportState, classify};
