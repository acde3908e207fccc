//! Discovery and connection records.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::{DateTime, Utc};

/// Endpoints negotiated with one peer.
///
/// Built once per discovered peer and replaced, never mutated, on reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Where this process listens for OSC datagrams.
    pub receive_endpoint: SocketAddr,
    /// The peer's OSC receiver.
    pub send_endpoint: SocketAddr,
    /// The peer's HTTP discovery responder.
    pub discovery_endpoint: SocketAddr,
    /// When the endpoints were resolved.
    pub resolved_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Creates connection info resolved now.
    pub fn new(
        receive_endpoint: SocketAddr,
        send_endpoint: SocketAddr,
        discovery_endpoint: SocketAddr,
    ) -> Self {
        Self {
            receive_endpoint,
            send_endpoint,
            discovery_endpoint,
            resolved_at: Utc::now(),
        }
    }

    /// Connection info for fixed endpoints without a discovery responder.
    pub fn direct(receive_endpoint: SocketAddr, send_endpoint: SocketAddr) -> Self {
        Self::new(
            receive_endpoint,
            send_endpoint,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        )
    }

    /// Returns false when the peer has no known discovery responder.
    pub fn has_discovery_endpoint(&self) -> bool {
        self.discovery_endpoint.port() != 0
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "receive {} / send {} / discovery {}",
            self.receive_endpoint, self.send_endpoint, self.discovery_endpoint
        )
    }
}

/// A service resolved from a multicast answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncedService {
    /// `canonical-name:port`, stable across repeated announcements.
    pub service_id: String,
    /// Instance name, e.g. `VRChat-Client-A1B2C3`.
    pub service_name: String,
    /// Resolved addresses, IPv4 first.
    pub addresses: Vec<IpAddr>,
    /// Service port.
    pub port: u16,
    /// Transport label of the service type, e.g. `_tcp` or `_udp`.
    pub service_type: String,
}

impl AnnouncedService {
    /// Builds a service from a fully-qualified SRV name such as
    /// `VRChat-Client-A1B2C3._oscjson._tcp.local.`.
    ///
    /// Returns `None` if the name has fewer than three labels.
    pub fn from_record(fullname: &str, mut addresses: Vec<IpAddr>, port: u16) -> Option<Self> {
        let labels: Vec<&str> = fullname.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() < 3 {
            return None;
        }

        let canonical = labels.join(".").to_ascii_lowercase();
        addresses.sort_by_key(|addr| addr.is_ipv6());
        addresses.dedup();

        Some(Self {
            service_id: format!("{}:{}", canonical, port),
            service_name: labels[0].to_string(),
            addresses,
            port,
            service_type: labels[2].to_string(),
        })
    }

    /// The first resolved address, if any.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }

    /// The discovery endpoint of this service, if it has an address.
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.primary_address()
            .map(|addr| SocketAddr::new(addr, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn from_record_parses_labels() {
        let service = AnnouncedService::from_record(
            "VRChat-Client-A1B2C3._oscjson._tcp.local.",
            vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))],
            9001,
        )
        .unwrap();

        assert_eq!(service.service_name, "VRChat-Client-A1B2C3");
        assert_eq!(service.service_type, "_tcp");
        assert_eq!(service.port, 9001);
        assert_eq!(
            service.service_id,
            "vrchat-client-a1b2c3._oscjson._tcp.local:9001"
        );
        assert_eq!(
            service.endpoint(),
            Some("192.168.1.20:9001".parse().unwrap())
        );
    }

    #[test]
    fn service_id_is_stable_across_trailing_dot() {
        let a = AnnouncedService::from_record("X._osc._udp.local.", vec![], 1).unwrap();
        let b = AnnouncedService::from_record("X._osc._udp.local", vec![], 1).unwrap();
        assert_eq!(a.service_id, b.service_id);
    }

    #[test]
    fn from_record_rejects_short_names() {
        assert!(AnnouncedService::from_record("local.", vec![], 1).is_none());
    }

    #[test]
    fn ipv4_addresses_come_first() {
        let service = AnnouncedService::from_record(
            "X._oscjson._tcp.local.",
            vec![
                IpAddr::V6(Ipv6Addr::LOCALHOST),
                IpAddr::V4(Ipv4Addr::LOCALHOST),
            ],
            1,
        )
        .unwrap();
        assert_eq!(service.primary_address(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn direct_connection_has_no_discovery_endpoint() {
        let info = ConnectionInfo::direct(
            "127.0.0.1:9001".parse().unwrap(),
            "127.0.0.1:9000".parse().unwrap(),
        );
        assert!(!info.has_discovery_endpoint());
    }
}
