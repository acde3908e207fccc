//! High-level OSC client.
//!
//! [`OscClient`] ties discovery to the transport: every peer the
//! [`QueryService`] finds (re)starts the transport against it, and every
//! avatar change re-fetches the avatar's parameter map.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use oscq_core::{
    Argument, AvatarChangedMessage, BroadcastEvent, ChatMessage, ConnectionInfo, HandlerError,
    Message, MessageFilter, ParameterChangedMessage,
};
use oscq_discovery::{DataFetcher, DiscoveryResult, Multicaster, ParameterMap};
use oscq_server::Transport;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::query_service::QueryService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not started, or stopped.
    Idle,
    /// Discovery running, no peer yet.
    WaitingForFirstPeer,
    /// Transport running against a peer.
    Connected,
}

struct Inner {
    query: QueryService,
    transport: Transport,
    fetcher: DataFetcher,
    filter: ArcSwap<MessageFilter>,
    connection: ArcSwapOption<ConnectionInfo>,
    state: watch::Sender<ClientState>,
    avatar_changed: BroadcastEvent<ParameterMap>,
    peer_found: BroadcastEvent<ConnectionInfo>,
}

impl Inner {
    async fn connect(&self, connection: ConnectionInfo) -> Result<(), HandlerError> {
        let filter = MessageFilter::clone(&self.filter.load());
        let started = self
            .transport
            .start(&connection, filter, &CancellationToken::new())
            .await;
        if let Err(e) = started {
            // The previous peer's sockets are gone either way.
            self.connection.store(None);
            self.state.send_replace(ClientState::WaitingForFirstPeer);
            return Err(e.into());
        }

        self.connection.store(Some(Arc::new(connection.clone())));
        self.state.send_replace(ClientState::Connected);
        info!(%connection, "Connected to peer");

        self.peer_found.invoke(connection).await
    }

    async fn reload_parameters(&self, message: AvatarChangedMessage) -> Result<(), HandlerError> {
        debug!(avatar = message.avatar_id(), "Avatar changed, reloading parameters");
        let parameters = self.current_parameters().await?;
        self.avatar_changed.invoke(parameters).await
    }

    async fn current_parameters(&self) -> DiscoveryResult<ParameterMap> {
        match self.connection.load_full() {
            Some(connection) if connection.has_discovery_endpoint() => {
                let endpoint = connection.discovery_endpoint;
                self.fetcher
                    .fetch_parameters(endpoint.ip(), endpoint.port())
                    .await
            }
            _ => Ok(ParameterMap::new()),
        }
    }
}

/// Discovers a peer, keeps the transport pointed at it, and sends to it.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct OscClient {
    inner: Arc<Inner>,
}

impl OscClient {
    pub fn new(query: QueryService, transport: Transport, fetcher: DataFetcher) -> Self {
        let (state, _) = watch::channel(ClientState::Idle);
        let inner = Arc::new(Inner {
            query,
            transport,
            fetcher,
            filter: ArcSwap::from_pointee(MessageFilter::new()),
            connection: ArcSwapOption::empty(),
            state,
            avatar_changed: BroadcastEvent::new(),
            peer_found: BroadcastEvent::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner.query.peer_found().add(move |connection| {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.connect(connection).await,
                    None => Ok(()),
                }
            }
        });

        let weak = Arc::downgrade(&inner);
        inner.transport.events().avatar_changed.add(move |message| {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.reload_parameters(message).await,
                    None => Ok(()),
                }
            }
        });

        Self { inner }
    }

    /// A client over mDNS and `reqwest`, configured from `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let fetcher = DataFetcher::from_config(&config.fetcher_config())?;
        let query = QueryService::new(config.query_config(), Multicaster::mdns(), fetcher.clone())?;
        Ok(Self::new(query, Transport::default(), fetcher))
    }

    pub fn state(&self) -> ClientState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.inner.state.subscribe()
    }

    /// Endpoints of the current peer.
    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.inner.connection.load_full().map(|c| ConnectionInfo::clone(&c))
    }

    pub fn query_service(&self) -> &QueryService {
        &self.inner.query
    }

    pub fn on_message_received(&self) -> &BroadcastEvent<Message> {
        &self.inner.transport.events().message_received
    }

    pub fn on_parameter_received(&self) -> &BroadcastEvent<ParameterChangedMessage> {
        &self.inner.transport.events().parameter_changed
    }

    /// Raised with the avatar's parameter map after every avatar change.
    pub fn on_avatar_changed(&self) -> &BroadcastEvent<ParameterMap> {
        &self.inner.avatar_changed
    }

    /// Raised after the transport is (re)started against a peer.
    pub fn on_peer_found(&self) -> &BroadcastEvent<ConnectionInfo> {
        &self.inner.peer_found
    }

    /// Starts discovery. Returns once advertising, without waiting for a peer.
    pub async fn start(&self, filter: MessageFilter, token: &CancellationToken) -> ClientResult<()> {
        info!("Starting client");
        self.inner.filter.store(Arc::new(filter));
        self.inner.state.send_replace(ClientState::WaitingForFirstPeer);

        if let Err(e) = self.inner.query.start(token).await {
            self.inner.state.send_replace(ClientState::Idle);
            return Err(e);
        }
        Ok(())
    }

    /// Starts discovery and waits until a peer is connected or the client is
    /// stopped. Cancelling `token` ends the wait without an error.
    pub async fn start_and_wait(
        &self,
        filter: MessageFilter,
        token: &CancellationToken,
    ) -> ClientResult<()> {
        let mut state = self.subscribe_state();
        self.start(filter, token).await?;

        tokio::select! {
            result = state.wait_for(|s| *s != ClientState::WaitingForFirstPeer) => {
                result.map_err(|_| ClientError::Cancelled)?;
            }
            _ = token.cancelled() => {
                debug!("Stopped waiting for the first peer");
            }
        }
        Ok(())
    }

    /// Skips discovery and connects the transport to fixed endpoints.
    pub async fn start_with_endpoints(
        &self,
        send: SocketAddr,
        receive: SocketAddr,
        filter: MessageFilter,
        token: &CancellationToken,
    ) -> ClientResult<()> {
        let connection = ConnectionInfo::direct(receive, send);
        self.inner.filter.store(Arc::new(filter.clone()));
        self.inner.transport.start(&connection, filter, token).await?;

        self.inner.connection.store(Some(Arc::new(connection.clone())));
        self.inner.state.send_replace(ClientState::Connected);
        info!(%connection, "Connected to fixed endpoints");

        self.inner
            .peer_found
            .invoke(connection)
            .await
            .map_err(|e| ClientError::Handler(e.to_string()))
    }

    /// Stops discovery and the transport.
    pub async fn stop(&self, token: &CancellationToken) {
        info!("Stopping client");
        self.inner.query.stop().await;
        self.inner.transport.stop(token).await;
        self.inner.connection.store(None);
        self.inner.state.send_replace(ClientState::Idle);
    }

    /// Sends `message` to the peer. Does nothing while not connected.
    pub async fn send(&self, message: &Message) -> ClientResult<()> {
        self.inner.transport.send(message).await?;
        Ok(())
    }

    pub async fn send_chat_message(
        &self,
        text: impl Into<String>,
        bypass_keyboard: bool,
        play_notification: bool,
    ) -> ClientResult<()> {
        let chat = ChatMessage::new(text)
            .with_bypass_keyboard(bypass_keyboard)
            .with_notification(play_notification);
        self.send(&chat.to_message()).await
    }

    /// Sets avatar parameter `name`, given without the address prefix.
    pub async fn send_parameter_change(
        &self,
        name: impl Into<String>,
        value: impl Into<Argument>,
    ) -> ClientResult<()> {
        let message: Message = ParameterChangedMessage::new(name, value).into();
        self.send(&message).await
    }

    /// Fetches the current avatar's parameters. Empty without a peer that has
    /// a discovery responder.
    pub async fn avatar_parameters(&self, token: &CancellationToken) -> ClientResult<ParameterMap> {
        tokio::select! {
            parameters = self.inner.current_parameters() => Ok(parameters?),
            _ = token.cancelled() => Err(ClientError::Cancelled),
        }
    }
}
