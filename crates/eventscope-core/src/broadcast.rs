//! Live-feed fan-out.
//!
//! Each subscriber owns a bounded queue. `publish` holds the registry lock
//! for one non-blocking `try_send` per subscriber, so a publish is atomic with
//! respect to `subscribe`, `unsubscribe`, heartbeats and other publishes:
//! every subscriber sees events at most once and in publish order.
//!
//! A subscriber whose queue is full, or whose receiving side is gone, is
//! removed during the publish that noticed it. Removal drops the hub's sender,
//! which ends the subscriber's receive loop and lets its task release the
//! underlying connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::event::LiveEvent;

/// Opaque subscriber identity. Never reused within a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriberHandle(u64);

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Hub-side lifecycle of a subscriber. `Closed` is terminal.
///
/// The transport handshake (`Connecting`) happens before a subscriber is
/// registered, so the hub only ever reports the two post-handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    Active,
    Closed,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Events a subscriber may have queued before it is dropped.
    pub buffer: usize,
    /// Silence after which a subscriber is reaped.
    pub heartbeat_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer: 64,
            heartbeat_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// The receiving end handed to a new subscriber.
pub struct Subscription {
    handle: SubscriberHandle,
    receiver: mpsc::Receiver<Arc<LiveEvent>>,
}

impl Subscription {
    pub fn handle(&self) -> SubscriberHandle {
        self.handle
    }

    /// Next event, or `None` once the hub has closed this subscriber and
    /// every queued event has been drained.
    pub async fn recv(&mut self) -> Option<Arc<LiveEvent>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<LiveEvent>> {
        self.receiver.try_recv().ok()
    }
}

struct Slot {
    sender: mpsc::Sender<Arc<LiveEvent>>,
    last_seen: Instant,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<SubscriberHandle, Slot>,
    shut_down: bool,
}

pub struct BroadcastHub {
    config: HubConfig,
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config: HubConfig {
                buffer: config.buffer.max(1),
                ..config
            },
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new active subscriber.
    ///
    /// After [`shutdown`](Self::shutdown) the returned subscription is
    /// already closed: its first `recv` yields `None`.
    pub async fn subscribe(&self) -> Subscription {
        let handle = SubscriberHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.config.buffer);

        let mut registry = self.registry.lock().await;
        if registry.shut_down {
            debug!(subscriber = %handle, "Hub shut down; subscription closed immediately");
        } else {
            registry.slots.insert(
                handle,
                Slot {
                    sender,
                    last_seen: Instant::now(),
                },
            );
            info!(subscriber = %handle, active = registry.slots.len(), "Live subscriber connected");
        }
        Subscription { handle, receiver }
    }

    /// Close a subscriber. Returns `false` when it was already closed.
    pub async fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        let mut registry = self.registry.lock().await;
        let removed = registry.slots.remove(&handle).is_some();
        if removed {
            info!(subscriber = %handle, active = registry.slots.len(), "Live subscriber disconnected");
        }
        removed
    }

    /// Deliver `event` to every active subscriber.
    ///
    /// Never fails and never waits on a subscriber: unreachable subscribers
    /// are closed and counted in the report.
    pub async fn publish(&self, event: LiveEvent) -> PublishReport {
        let event = Arc::new(event);
        let mut report = PublishReport::default();

        let mut registry = self.registry.lock().await;
        registry
            .slots
            .retain(|handle, slot| match slot.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %handle, "Live subscriber queue full; closing");
                    report.dropped += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(subscriber = %handle, "Live subscriber unreachable; closing");
                    report.dropped += 1;
                    false
                }
            });
        drop(registry);

        debug!(
            event_id = %event.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "Live event published"
        );
        report
    }

    /// Record that a subscriber is alive. Returns `false` if it is closed.
    pub async fn heartbeat(&self, handle: SubscriberHandle) -> bool {
        let mut registry = self.registry.lock().await;
        match registry.slots.get_mut(&handle) {
            Some(slot) => {
                slot.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Close every subscriber silent for longer than the heartbeat timeout.
    pub async fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let timeout = self.config.heartbeat_timeout;
        let mut registry = self.registry.lock().await;
        let before = registry.slots.len();
        registry.slots.retain(|handle, slot| {
            let alive = now.duration_since(slot.last_seen) <= timeout;
            if !alive {
                info!(subscriber = %handle, "Live subscriber missed heartbeat; closing");
            }
            alive
        });
        before - registry.slots.len()
    }

    pub async fn state(&self, handle: SubscriberHandle) -> SubscriberState {
        if self.registry.lock().await.slots.contains_key(&handle) {
            SubscriberState::Active
        } else {
            SubscriberState::Closed
        }
    }

    pub async fn active_count(&self) -> usize {
        self.registry.lock().await.slots.len()
    }

    /// Close every subscriber and refuse new ones.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        registry.shut_down = true;
        let closed = registry.slots.len();
        registry.slots.clear();
        info!(closed, "Broadcast hub shut down");
    }

    /// Background loop: reap idle subscribers every `interval` until shutdown.
    pub async fn run_reaper_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.registry.lock().await.shut_down {
                break;
            }
            let reaped = self.reap_idle().await;
            if reaped > 0 {
                debug!(reaped, "Idle live subscribers reaped");
            }
        }
    }
}
