//! UDP transport: one send socket connected to the peer, one receive socket
//! bound locally, and a background loop that classifies inbound datagrams.
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//! ```
//!
//! Start and stop hold the same gate for the whole transition, so they never
//! interleave. The receive loop awaits each event before reading the next
//! datagram: a slow subscriber slows the loop down instead of queueing.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use oscq_core::{
    AvatarChangedMessage, BroadcastEvent, ConnectionInfo, HandlerError, Message, MessageError,
    MessageFilter, ParameterChangedMessage,
};
use oscq_protocol::codec;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::TransportConfig;
use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Events raised by the receive loop.
#[derive(Clone, Default)]
pub struct TransportEvents {
    pub parameter_changed: BroadcastEvent<ParameterChangedMessage>,
    pub avatar_changed: BroadcastEvent<AvatarChangedMessage>,
    pub message_received: BroadcastEvent<Message>,
}

/// What a datagram turned out to be after filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    ParameterChanged(ParameterChangedMessage),
    AvatarChanged(AvatarChangedMessage),
    Message(Message),
}

/// Decides which event, if any, a decoded message raises.
///
/// Checked in order: parameter change, avatar change, plain message. A
/// parameter change needs both patterns to match; an avatar change only needs
/// the address pattern.
pub fn classify(message: Message, filter: &MessageFilter) -> Result<Option<Inbound>, MessageError> {
    if !filter.matches_address(&message) {
        return Ok(None);
    }

    if message.is_parameter_change() {
        if !filter.receive_parameter_changes {
            return Ok(None);
        }
        let parameter = ParameterChangedMessage::try_from(message)?;
        return Ok(filter
            .matches_parameter(&parameter)
            .then_some(Inbound::ParameterChanged(parameter)));
    }

    if message.is_avatar_change() {
        return Ok(Some(Inbound::AvatarChanged(message.into())));
    }

    Ok(filter.receive_messages.then_some(Inbound::Message(message)))
}

struct ReceiveLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct Active {
    receiver: Arc<UdpSocket>,
    receive_loop: Option<ReceiveLoop>,
}

pub struct Transport {
    config: TransportConfig,
    gate: Mutex<Option<Active>>,
    sender: ArcSwapOption<UdpSocket>,
    state: watch::Sender<TransportState>,
    events: TransportEvents,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        let (state, _) = watch::channel(TransportState::Stopped);
        Self {
            config,
            gate: Mutex::new(None),
            sender: ArcSwapOption::empty(),
            state,
            events: TransportEvents::default(),
        }
    }

    pub fn events(&self) -> &TransportEvents {
        &self.events
    }

    pub fn state(&self) -> TransportState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    /// Local address of the send socket, if connected.
    pub fn local_send_addr(&self) -> Option<SocketAddr> {
        self.sender.load_full()?.local_addr().ok()
    }

    /// Opens both sockets and starts the receive loop if `filter` delivers
    /// anything. A running transport is stopped first.
    ///
    /// If either socket fails, nothing stays open and the error is returned.
    pub async fn start(
        &self,
        info: &ConnectionInfo,
        filter: MessageFilter,
        token: &CancellationToken,
    ) -> ServerResult<()> {
        let mut active = self.gate.lock().await;
        if let Some(previous) = active.take() {
            self.shutdown(previous, token).await;
        }

        self.state.send_replace(TransportState::Starting);
        let (sender, receiver) = match open_sockets(info).await {
            Ok(sockets) => sockets,
            Err(e) => {
                error!(error = %e, "Failed to start transport");
                self.state.send_replace(TransportState::Stopped);
                return Err(e);
            }
        };

        let receiver = Arc::new(receiver);
        self.sender.store(Some(Arc::new(sender)));

        let receive_loop = if filter.receives_anything() {
            let token = token.child_token();
            let task = tokio::spawn(receive_loop(
                Arc::clone(&receiver),
                filter,
                self.events.clone(),
                self.config.buffer_size,
                token.clone(),
            ));
            Some(ReceiveLoop { token, task })
        } else {
            debug!("Filter delivers nothing, receive loop not started");
            None
        };

        *active = Some(Active {
            receiver,
            receive_loop,
        });
        self.state.send_replace(TransportState::Running);
        info!(
            receive = %info.receive_endpoint,
            send = %info.send_endpoint,
            "Transport running"
        );
        Ok(())
    }

    /// Stops the receive loop and releases both sockets. No-op when stopped.
    ///
    /// Cancelling `token` while waiting for the loop aborts it instead.
    pub async fn stop(&self, token: &CancellationToken) {
        let mut active = self.gate.lock().await;
        if let Some(previous) = active.take() {
            info!("Transport stopping");
            self.shutdown(previous, token).await;
        }
    }

    /// Encodes and sends `message` to the peer. No-op when not connected.
    pub async fn send(&self, message: &Message) -> ServerResult<()> {
        let Some(sender) = self.sender.load_full() else {
            trace!(address = %message.address, "Transport not connected, dropping message");
            return Ok(());
        };

        let bytes = codec::serialize(message);
        sender.send(&bytes).await?;
        trace!(address = %message.address, len = bytes.len(), "Sent message");
        Ok(())
    }

    async fn shutdown(&self, active: Active, token: &CancellationToken) {
        self.state.send_replace(TransportState::Stopping);

        if let Some(ReceiveLoop { token: loop_token, mut task }) = active.receive_loop {
            loop_token.cancel();
            tokio::select! {
                joined = &mut task => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Receive loop ended abnormally");
                    }
                }
                _ = token.cancelled() => {
                    warn!("Stop cancelled, aborting receive loop");
                    task.abort();
                }
            }
        }

        self.sender.store(None);
        drop(active.receiver);
        self.state.send_replace(TransportState::Stopped);
    }
}

fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    let ip = match peer.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

async fn open_sockets(info: &ConnectionInfo) -> ServerResult<(UdpSocket, UdpSocket)> {
    let local = unspecified_for(info.send_endpoint);
    let sender = UdpSocket::bind(local)
        .await
        .map_err(|e| ServerError::bind(local, e))?;
    sender
        .connect(info.send_endpoint)
        .await
        .map_err(|e| ServerError::connect(info.send_endpoint, e))?;

    let receiver = UdpSocket::bind(info.receive_endpoint)
        .await
        .map_err(|e| ServerError::bind(info.receive_endpoint, e))?;

    Ok((sender, receiver))
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    filter: MessageFilter,
    events: TransportEvents,
    buffer_size: usize,
    token: CancellationToken,
) {
    let mut buf = vec![0u8; buffer_size];
    debug!("Receive loop started");

    loop {
        let (len, from) = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "Failed to receive datagram");
                    continue;
                }
            },
        };

        let message = codec::parse(&buf[..len]);
        trace!(%from, address = %message.address, len, "Received datagram");

        if let Err(e) = deliver(message, &filter, &events).await {
            error!(error = %e, "Exception while handling datagram");
        }
    }

    debug!("Receive loop exited");
}

async fn deliver(
    message: Message,
    filter: &MessageFilter,
    events: &TransportEvents,
) -> Result<(), HandlerError> {
    match classify(message, filter)? {
        Some(Inbound::ParameterChanged(parameter)) => events.parameter_changed.invoke(parameter).await,
        Some(Inbound::AvatarChanged(avatar)) => events.avatar_changed.invoke(avatar).await,
        Some(Inbound::Message(message)) => events.message_received.invoke(message).await,
        None => Ok(()),
    }
}
