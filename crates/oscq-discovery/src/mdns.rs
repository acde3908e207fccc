//! [`MulticastTransport`] backed by the `mdns-sd` daemon.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use mdns_sd::{DaemonEvent, ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::{MulticastEvent, MulticastTransport, ServiceProfile, qualify};

type EventSender = mpsc::UnboundedSender<MulticastEvent>;

/// mDNS backend.
///
/// Every [`start`](MulticastTransport::start) creates a fresh daemon, since a
/// daemon that was shut down cannot be reused. Daemon channels are forwarded
/// into one tokio channel by background tasks that end when the daemon stops.
#[derive(Default)]
pub struct MdnsTransport {
    daemon: ArcSwapOption<ServiceDaemon>,
    events: ArcSwapOption<EventSender>,
}

impl MdnsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn daemon(&self) -> DiscoveryResult<Arc<ServiceDaemon>> {
        self.daemon
            .load_full()
            .ok_or_else(|| DiscoveryError::internal("mDNS daemon is not running"))
    }
}

impl MulticastTransport for MdnsTransport {
    fn start(&self) -> DiscoveryResult<mpsc::UnboundedReceiver<MulticastEvent>> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::multicast("Failed to start mDNS daemon").with_source(e))?;
        let monitor = daemon
            .monitor()
            .map_err(|e| DiscoveryError::multicast("Failed to monitor mDNS daemon").with_source(e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let forward = tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = monitor.recv_async().await {
                match event {
                    DaemonEvent::IpAdd(addr) => {
                        if forward.send(MulticastEvent::InterfaceDiscovered(addr)).is_err() {
                            break;
                        }
                    }
                    DaemonEvent::Error(e) => warn!(error = %e, "mDNS daemon error"),
                    other => trace!(event = ?other, "mDNS daemon event"),
                }
            }
        });

        if let Some(previous) = self.daemon.swap(Some(Arc::new(daemon))) {
            let _ = previous.shutdown();
        }
        self.events.store(Some(Arc::new(tx)));
        Ok(rx)
    }

    fn advertise(&self, profile: &ServiceProfile) -> DiscoveryResult<()> {
        let addresses = profile
            .addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let info = ServiceInfo::new(
            &profile.qualified_service_type(),
            &profile.instance_name,
            &profile.host_name(),
            addresses.as_str(),
            profile.port,
            HashMap::<String, String>::new(),
        )
        .map_err(|e| {
            DiscoveryError::configuration(format!("Invalid service profile {}", profile.fullname()))
                .with_source(e)
        })?;

        debug!(service = %profile.fullname(), port = profile.port, "Advertising service");
        self.daemon()?.register(info).map_err(|e| {
            DiscoveryError::multicast(format!("Failed to advertise {}", profile.fullname()))
                .with_source(e)
        })
    }

    fn unadvertise(&self, profile: &ServiceProfile) -> DiscoveryResult<()> {
        debug!(service = %profile.fullname(), "Unadvertising service");
        self.daemon()?
            .unregister(&profile.fullname())
            .map(|_| ())
            .map_err(|e| {
                DiscoveryError::multicast(format!("Failed to unadvertise {}", profile.fullname()))
                    .with_source(e)
            })
    }

    fn query(&self, service_type: &str) -> DiscoveryResult<()> {
        let events = self
            .events
            .load_full()
            .ok_or_else(|| DiscoveryError::internal("mDNS transport is not started"))?;
        let qualified = qualify(service_type);
        let receiver = self.daemon()?.browse(&qualified).map_err(|e| {
            DiscoveryError::multicast(format!("Failed to query {}", qualified)).with_source(e)
        })?;

        trace!(service_type = %qualified, "Sent mDNS query");
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                let ServiceEvent::ServiceResolved(info) = event else {
                    continue;
                };
                let resolved = MulticastEvent::ServiceResolved {
                    fullname: info.get_fullname().to_string(),
                    addresses: info.get_addresses().iter().copied().collect(),
                    port: info.get_port(),
                };
                if events.send(resolved).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    fn stop(&self) -> DiscoveryResult<()> {
        self.events.store(None);
        let Some(daemon) = self.daemon.swap(None) else {
            return Ok(());
        };
        daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::multicast("Failed to stop mDNS daemon").with_source(e))
    }
}
