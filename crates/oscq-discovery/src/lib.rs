//! Peer discovery: the mDNS listener and the OSCQuery endpoint negotiator

pub mod error;
pub mod fetcher;
pub mod mdns;
pub mod multicaster;
pub mod transport;

pub use error::{DiscoveryError, DiscoveryErrorCode, DiscoveryResult};
pub use fetcher::{DataFetcher, FetcherConfig, HOST_INFO_QUERY, HttpFetch, ParameterMap, ReqwestFetch};
pub use mdns::MdnsTransport;
pub use multicaster::Multicaster;
pub use transport::{MulticastEvent, MulticastTransport, ServiceProfile};
