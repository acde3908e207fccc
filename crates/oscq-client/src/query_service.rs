//! Discovery orchestration.
//!
//! [`QueryService`] advertises this process over mDNS, serves the OSCQuery
//! documents over HTTP, and turns peer announcements into
//! [`ConnectionInfo`]s on its `peer_found` event.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use oscq_core::{AnnouncedService, BroadcastEvent, ConnectionInfo, HandlerError};
use oscq_discovery::{DataFetcher, Multicaster, ServiceProfile};
use oscq_server::{DiscoveryResponder, PortKind, ResponderConfig, available_port};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::error::ClientResult;

/// Service type of the HTTP discovery responder.
pub const OSC_JSON_SERVICE: &str = "_oscjson._tcp";

/// Service type of the OSC receiver.
pub const OSC_SERVICE: &str = "_osc._udp";

/// Transport label a peer's discovery responder is announced under.
const PEER_SERVICE_TYPE: &str = "_tcp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Instance name of both advertised profiles.
    pub service_name: String,
    /// Address advertised and listened on.
    pub address: IpAddr,
    /// Accepted peers' instance names start with this.
    pub peer_prefix: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            service_name: "oscq-client".to_string(),
            address: crate::config::DEFAULT_ADDRESS,
            peer_prefix: "VRChat-Client-".to_string(),
        }
    }
}

/// Filters announcements and negotiates endpoints with accepted peers.
#[derive(Clone)]
struct PeerResolver {
    peer_prefix: String,
    receive_endpoint: SocketAddr,
    fetcher: DataFetcher,
    peer_found: BroadcastEvent<ConnectionInfo>,
    latest_peer: Arc<ArcSwapOption<String>>,
}

impl PeerResolver {
    fn accepts(&self, service: &AnnouncedService) -> bool {
        if service.service_type != PEER_SERVICE_TYPE
            || !service.service_name.starts_with(&self.peer_prefix)
        {
            return false;
        }
        let latest = self.latest_peer.load();
        latest.as_deref() != Some(&service.service_id)
    }

    async fn resolve(self, service: AnnouncedService) -> Result<(), HandlerError> {
        if !self.accepts(&service) {
            trace!(service = %service.service_id, "Ignoring announcement");
            return Ok(());
        }
        let Some(discovery) = service.endpoint() else {
            warn!(service = %service.service_id, "Announcement carries no address");
            return Ok(());
        };

        let send = self
            .fetcher
            .resolve_receive_endpoint(discovery.ip(), discovery.port())
            .await?;
        let connection = ConnectionInfo::new(self.receive_endpoint, send, discovery);
        info!(peer = %service.service_name, %connection, "Peer found");

        self.peer_found.invoke(connection).await?;
        self.latest_peer.store(Some(Arc::new(service.service_id)));
        Ok(())
    }
}

pub struct QueryService {
    config: QueryConfig,
    http_port: u16,
    osc_port: u16,
    responder: DiscoveryResponder,
    multicaster: Multicaster,
    peer_found: BroadcastEvent<ConnectionInfo>,
    latest_peer: Arc<ArcSwapOption<String>>,
}

impl QueryService {
    /// Allocates the HTTP and OSC ports and wires `multicaster` announcements
    /// to endpoint negotiation through `fetcher`.
    pub fn new(
        config: QueryConfig,
        multicaster: Multicaster,
        fetcher: DataFetcher,
    ) -> ClientResult<Self> {
        let http_port = available_port(PortKind::Tcp)?;
        let osc_port = available_port(PortKind::Udp)?;

        let responder = DiscoveryResponder::new(ResponderConfig::new(
            config.service_name.clone(),
            SocketAddr::new(config.address, http_port),
            SocketAddr::new(config.address, osc_port),
        ));

        let peer_found = BroadcastEvent::new();
        let latest_peer = Arc::new(ArcSwapOption::empty());
        let resolver = PeerResolver {
            peer_prefix: config.peer_prefix.clone(),
            receive_endpoint: SocketAddr::new(config.address, osc_port),
            fetcher,
            peer_found: peer_found.clone(),
            latest_peer: Arc::clone(&latest_peer),
        };
        multicaster
            .service_answered()
            .add(move |service| resolver.clone().resolve(service));

        Ok(Self {
            config,
            http_port,
            osc_port,
            responder,
            multicaster,
            peer_found,
            latest_peer,
        })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn osc_port(&self) -> u16 {
        self.osc_port
    }

    /// Raised with the negotiated endpoints of every newly accepted peer.
    pub fn peer_found(&self) -> &BroadcastEvent<ConnectionInfo> {
        &self.peer_found
    }

    /// Service id of the most recently accepted peer.
    pub fn latest_peer(&self) -> Option<String> {
        self.latest_peer.load_full().map(|id| id.as_ref().clone())
    }

    fn profiles(&self) -> Vec<ServiceProfile> {
        let name = &self.config.service_name;
        let addresses = vec![self.config.address];
        vec![
            ServiceProfile::new(name.clone(), OSC_JSON_SERVICE, self.http_port, addresses.clone()),
            ServiceProfile::new(name.clone(), OSC_SERVICE, self.osc_port, addresses),
        ]
    }

    /// Starts the HTTP responder, then advertises and listens for peers.
    pub async fn start(&self, token: &CancellationToken) -> ClientResult<()> {
        info!(
            service = %self.config.service_name,
            http_port = self.http_port,
            osc_port = self.osc_port,
            "Starting query service"
        );
        self.responder.start(token).await?;

        if let Err(e) = self.multicaster.start(self.profiles(), token).await {
            self.responder.stop().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Stops discovery and forgets the last peer so the next start accepts
    /// any peer again.
    pub async fn stop(&self) {
        info!("Stopping query service");
        self.multicaster.stop().await;
        self.responder.stop().await;
        self.latest_peer.store(None);
    }
}
