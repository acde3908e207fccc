//! Multicast transport abstraction.
//!
//! The [`Multicaster`](crate::Multicaster) only needs to advertise, query, and
//! receive resolved records; [`MulticastTransport`] is that seam, so the
//! listener can be driven by an in-process fake in tests.

use std::net::IpAddr;

use tokio::sync::mpsc;

use crate::error::DiscoveryResult;

/// Suffix appended to service types and host names.
pub const LOCAL_DOMAIN: &str = "local.";

/// A service this process advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProfile {
    /// Instance name, shared by every profile of one process.
    pub instance_name: String,
    /// Service type without domain, e.g. `_oscjson._tcp`.
    pub service_type: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
}

impl ServiceProfile {
    pub fn new(
        instance_name: impl Into<String>,
        service_type: impl Into<String>,
        port: u16,
        addresses: Vec<IpAddr>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            service_type: service_type.into(),
            port,
            addresses,
        }
    }

    /// `_oscjson._tcp.local.`
    pub fn qualified_service_type(&self) -> String {
        qualify(&self.service_type)
    }

    /// `instance._oscjson._tcp.local.`
    pub fn fullname(&self) -> String {
        format!("{}.{}", self.instance_name, self.qualified_service_type())
    }

    /// `instance.local.`
    pub fn host_name(&self) -> String {
        format!("{}.{}", self.instance_name, LOCAL_DOMAIN)
    }
}

/// Appends the local domain to a bare service type.
pub fn qualify(service_type: &str) -> String {
    format!("{}.{}", service_type.trim_end_matches('.'), LOCAL_DOMAIN)
}

/// Something the transport observed on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MulticastEvent {
    /// A network interface came up.
    InterfaceDiscovered(IpAddr),
    /// A service record was resolved to addresses and a port.
    ServiceResolved {
        fullname: String,
        addresses: Vec<IpAddr>,
        port: u16,
    },
}

/// A multicast service-discovery backend.
pub trait MulticastTransport: Send + Sync {
    /// Starts the backend and returns the stream of observed events.
    fn start(&self) -> DiscoveryResult<mpsc::UnboundedReceiver<MulticastEvent>>;

    fn advertise(&self, profile: &ServiceProfile) -> DiscoveryResult<()>;

    fn unadvertise(&self, profile: &ServiceProfile) -> DiscoveryResult<()>;

    /// Sends a query for a bare service type such as `_osc._udp`.
    fn query(&self, service_type: &str) -> DiscoveryResult<()>;

    /// Stops the backend; the event stream ends.
    fn stop(&self) -> DiscoveryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn profile_names() {
        let profile = ServiceProfile::new(
            "oscq-client",
            "_oscjson._tcp",
            9000,
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        );

        assert_eq!(profile.qualified_service_type(), "_oscjson._tcp.local.");
        assert_eq!(profile.fullname(), "oscq-client._oscjson._tcp.local.");
        assert_eq!(profile.host_name(), "oscq-client.local.");
    }

    #[test]
    fn qualify_is_idempotent_on_trailing_dot() {
        assert_eq!(qualify("_osc._udp"), "_osc._udp.local.");
        assert_eq!(qualify("_osc._udp."), "_osc._udp.local.");
    }
}
