//! Discovery listener.
//!
//! Advertises this process's service profiles and turns every resolved
//! service record into one [`AnnouncedService`] on the `service_answered`
//! event. Interfaces that come up after start trigger a fresh query for every
//! advertised service type.

use std::sync::Arc;

use oscq_core::{AnnouncedService, BroadcastEvent};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::DiscoveryResult;
use crate::mdns::MdnsTransport;
use crate::transport::{MulticastEvent, MulticastTransport, ServiceProfile};

struct Running {
    profiles: Vec<ServiceProfile>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Multicaster {
    transport: Arc<dyn MulticastTransport>,
    service_answered: BroadcastEvent<AnnouncedService>,
    running: Mutex<Option<Running>>,
}

impl Multicaster {
    pub fn new(transport: Arc<dyn MulticastTransport>) -> Self {
        Self {
            transport,
            service_answered: BroadcastEvent::new(),
            running: Mutex::new(None),
        }
    }

    /// A listener on the system mDNS responder.
    pub fn mdns() -> Self {
        Self::new(Arc::new(MdnsTransport::new()))
    }

    /// Raised once per resolved service record.
    pub fn service_answered(&self) -> &BroadcastEvent<AnnouncedService> {
        &self.service_answered
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Starts the transport, advertises `profiles`, and queries their types.
    ///
    /// Restarts if already running. The dispatch loop ends when `token` is
    /// cancelled or [`stop`](Self::stop) is called.
    pub async fn start(
        &self,
        profiles: Vec<ServiceProfile>,
        token: &CancellationToken,
    ) -> DiscoveryResult<()> {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            self.shutdown(previous).await;
        }

        info!(profiles = profiles.len(), "Multicaster starting");
        let events = self.transport.start()?;
        if let Err(e) = self.announce(&profiles) {
            self.release(&profiles);
            return Err(e);
        }

        let token = token.child_token();
        let service_types = profiles.iter().map(|p| p.service_type.clone()).collect();
        let task = tokio::spawn(dispatch(
            events,
            service_types,
            Arc::clone(&self.transport),
            self.service_answered.clone(),
            token.clone(),
        ));

        *running = Some(Running {
            profiles,
            token,
            task,
        });
        Ok(())
    }

    /// Stops the transport and unadvertises every profile. Idempotent.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            info!("Multicaster stopping");
            self.shutdown(previous).await;
        }
    }

    fn announce(&self, profiles: &[ServiceProfile]) -> DiscoveryResult<()> {
        for profile in profiles {
            self.transport.advertise(profile)?;
        }
        for profile in profiles {
            self.transport.query(&profile.service_type)?;
        }
        Ok(())
    }

    async fn shutdown(&self, running: Running) {
        running.token.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "Multicaster dispatch task failed");
        }
        self.release(&running.profiles);
    }

    fn release(&self, profiles: &[ServiceProfile]) {
        for profile in profiles {
            if let Err(e) = self.transport.unadvertise(profile) {
                warn!(service = %profile.fullname(), error = %e, "Failed to unadvertise");
            }
        }
        if let Err(e) = self.transport.stop() {
            warn!(error = %e, "Failed to stop multicast transport");
        }
    }
}

async fn dispatch(
    mut events: mpsc::UnboundedReceiver<MulticastEvent>,
    service_types: Vec<String>,
    transport: Arc<dyn MulticastTransport>,
    service_answered: BroadcastEvent<AnnouncedService>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            MulticastEvent::InterfaceDiscovered(addr) => {
                debug!(%addr, "Network interface discovered");
                for service_type in &service_types {
                    if let Err(e) = transport.query(service_type) {
                        warn!(%service_type, error = %e, "Failed to re-query");
                    }
                }
            }
            MulticastEvent::ServiceResolved {
                fullname,
                addresses,
                port,
            } => {
                let Some(service) = AnnouncedService::from_record(&fullname, addresses, port) else {
                    debug!(%fullname, "Ignoring record with short name");
                    continue;
                };

                debug!(
                    service_id = %service.service_id,
                    instance = %service.service_name,
                    addresses = ?service.addresses,
                    port,
                    "Service located"
                );
                if let Err(e) = service_answered.invoke(service).await {
                    error!(error = %e, "Could not handle service answer");
                }
            }
        }
    }
    debug!("Multicaster dispatch loop exited");
}
