//! In-process fan-out of sequenced events to every connected websocket client.
//!
//! Sequencing and snapshotting happen under the registry lock; the actual
//! enqueueing happens under a separate fan-out lock taken before the registry
//! lock is released. Two publishers therefore deliver in `seq` order to every
//! client while registrations never wait behind a slow fan-out.

pub mod client;
pub mod sequencer;
mod viewer_count;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use livecart_core::config::RealtimeConfig;
use livecart_protocol::{CloseReason, Event, EventPayload};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

pub use client::{Client, ClientId, ClientKind, ClientQueue, ClientState, Frame, SendOutcome};
pub use sequencer::{Clock, Sequencer, SystemClock};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is shut down")]
    ShutDown,

    #[error("event could not be serialized")]
    Encode,
}

/// Hub tunables, usually derived from [`RealtimeConfig`].
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
    pub viewer_count_debounce: Duration,
}

impl From<&RealtimeConfig> for HubSettings {
    fn from(cfg: &RealtimeConfig) -> Self {
        Self {
            queue_capacity: cfg.queue_capacity,
            shutdown_grace: Duration::from_millis(cfg.shutdown_grace_ms),
            viewer_count_debounce: Duration::from_millis(cfg.viewer_count_debounce_ms),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

struct Registry {
    clients: HashMap<ClientId, Arc<Client>>,
    sequencer: Sequencer,
    shut_down: bool,
}

pub struct Hub {
    registry: Mutex<Registry>,
    /// Held from snapshot to last enqueue so fan-outs never interleave.
    fanout: Mutex<()>,
    /// Pinged on every registration change; drained by the viewer-count task.
    membership: Arc<Notify>,
    /// Woken when the last client deregisters.
    drained: Notify,
    settings: HubSettings,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Arc<Self> {
        Self::with_sequencer(settings, Sequencer::new())
    }

    pub fn with_sequencer(settings: HubSettings, sequencer: Sequencer) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(Registry {
                clients: HashMap::new(),
                sequencer,
                shut_down: false,
            }),
            fanout: Mutex::new(()),
            membership: Arc::new(Notify::new()),
            drained: Notify::new(),
            settings,
        })
    }

    /// Build a hub and spawn its viewer-count task. Must run inside a Tokio
    /// runtime.
    pub fn start(settings: HubSettings) -> Arc<Self> {
        let hub = Self::new(settings);
        viewer_count::spawn(&hub);
        hub
    }

    /// Add a client and mark it `active`. From here on it receives every
    /// event sequenced after this call returns.
    pub fn register(&self, client: Arc<Client>) -> Result<(), HubError> {
        let count = {
            let mut reg = self.lock_registry();
            if reg.shut_down {
                return Err(HubError::ShutDown);
            }
            client.mark_active();
            reg.clients.insert(client.id().to_string(), Arc::clone(&client));
            reg.clients.len()
        };

        info!(client_id = %client.id(), kind = client.kind().as_str(), clients = count, "client registered");
        self.membership.notify_one();
        Ok(())
    }

    /// Remove a client and mark it `closed`. Returns `false` if it was
    /// already gone, so callers may race on this freely.
    pub fn deregister(&self, id: &str) -> bool {
        let (removed, remaining) = {
            let mut reg = self.lock_registry();
            let removed = reg.clients.remove(id);
            (removed, reg.clients.len())
        };
        let Some(client) = removed else {
            return false;
        };

        client.mark_closed();
        let connected_ms = (chrono::Utc::now() - client.connected_at()).num_milliseconds();
        info!(
            client_id = %id,
            reason = client.close_reason().map(|r| r.as_str()).unwrap_or("unknown"),
            connected_ms,
            clients = remaining,
            "client deregistered"
        );
        self.membership.notify_one();
        if remaining == 0 {
            self.drained.notify_waiters();
        }
        true
    }

    pub fn client_count(&self) -> usize {
        self.lock_registry().clients.len()
    }

    #[cfg(test)]
    pub(crate) fn clients(&self) -> Vec<Arc<Client>> {
        self.lock_registry().clients.values().cloned().collect()
    }

    /// Sequence one payload and enqueue it to every active client.
    pub fn publish(&self, payload: EventPayload) -> Result<Arc<Frame>, HubError> {
        // publish_all skips only payloads it failed to serialize
        self.publish_all(vec![payload])?.pop().ok_or(HubError::Encode)
    }

    /// Sequence several payloads back to back. They receive consecutive
    /// `seq` values and reach every client in that order, with no other
    /// publisher's event in between.
    pub fn publish_all(&self, payloads: Vec<EventPayload>) -> Result<Vec<Arc<Frame>>, HubError> {
        let (events, targets, _order) = {
            let mut reg = self.lock_registry();
            if reg.shut_down {
                return Err(HubError::ShutDown);
            }
            let events: Vec<Event> = payloads
                .into_iter()
                .map(|payload| {
                    let (seq, ts) = reg.sequencer.next();
                    Event { seq, ts, payload }
                })
                .collect();
            let targets: Vec<Arc<Client>> = reg.clients.values().cloned().collect();
            let order = self.fanout.lock().unwrap_or_else(PoisonError::into_inner);
            (events, targets, order)
        };

        let mut frames = Vec::with_capacity(events.len());
        for event in events {
            let seq = event.seq;
            let frame = match Frame::seal(event) {
                Ok(frame) => Arc::new(frame),
                Err(e) => {
                    error!(seq, error = %e, "failed to serialize event, skipping fan-out");
                    continue;
                }
            };

            let mut delivered = 0usize;
            for client in &targets {
                if client.send(&frame) == SendOutcome::Queued {
                    delivered += 1;
                }
            }
            debug!(seq, kind = %frame.kind(), delivered, clients = targets.len(), "event published");
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Refuse further registrations and publishes, close every client with
    /// `1001`, and wait for their pumps to flush and deregister.
    pub async fn shutdown(&self) {
        let clients: Vec<Arc<Client>> = {
            let mut reg = self.lock_registry();
            if reg.shut_down {
                return;
            }
            reg.shut_down = true;
            reg.clients.values().cloned().collect()
        };

        info!(clients = clients.len(), "hub shutting down");
        for client in &clients {
            client.close(CloseReason::Shutdown);
        }
        self.membership.notify_one();

        let deadline = tokio::time::Instant::now() + self.settings.shutdown_grace + SHUTDOWN_MARGIN;
        loop {
            // registered before the check so a concurrent last deregister is not missed
            let drained = self.drained.notified();
            let remaining = self.client_count();
            if remaining == 0 {
                break;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                warn!(remaining = self.client_count(), "shutdown grace elapsed with clients still attached");
                break;
            }
        }
        info!("hub stopped");
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        // lets the viewer-count task observe the dropped hub and exit
        self.membership.notify_one();
    }
}

const SHUTDOWN_MARGIN: Duration = Duration::from_millis(500);
