use crate::state::metrics::HubMetrics;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on a listener's outbound queue length
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// What to do with a listener whose outbound queue is full during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlowListenerPolicy {
    /// Drop this message for the slow listener only
    #[default]
    Drop,
    /// Remove the slow listener; its session closes the socket
    Disconnect,
}

impl FromStr for SlowListenerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(format!("unknown slow listener policy: {}", other)),
        }
    }
}

/// Hub-side handle to one subscriber connection
///
/// The listener is OPEN while the session holds the receiving half of its
/// queue and CLOSED once that half is dropped. Closed is terminal.
#[derive(Debug)]
pub struct Listener {
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<Arc<str>>,
}

impl Listener {
    /// Create a listener with a bounded outbound queue
    ///
    /// `capacity` is clamped to `1..=MAX_QUEUE_CAPACITY`.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_QUEUE_CAPACITY));
        let listener = Self {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
            tx,
        };
        (listener, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn try_send(&self, message: Arc<str>) -> Result<(), TrySendError<Arc<str>>> {
        self.tx.try_send(message)
    }
}

/// Broadcast hub: the active listener set and the fan-out sweep
pub struct Hub {
    listeners: Mutex<Vec<Listener>>,
    policy: SlowListenerPolicy,
    pub metrics: HubMetrics,
}

impl Hub {
    pub fn new(policy: SlowListenerPolicy) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            policy,
            metrics: HubMetrics::new(),
        }
    }

    pub fn policy(&self) -> SlowListenerPolicy {
        self.policy
    }

    /// Lock the listener set. Mutations in `World` run under this guard so
    /// that broadcasts for an entity go out in mutation order.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a listener to the active set
    pub fn register(&self, listener: Listener) {
        let mut listeners = self.lock();
        self.register_locked(&mut listeners, listener);
    }

    pub(crate) fn register_locked(&self, listeners: &mut Vec<Listener>, listener: Listener) {
        debug!(listener_id = %listener.id, "Listener registered");
        listeners.push(listener);
        self.metrics.record_subscription();
    }

    /// Send a pre-serialized message to every open listener
    pub fn notify(&self, message: Arc<str>) {
        let mut listeners = self.lock();
        self.broadcast_locked(&mut listeners, message);
    }

    /// Remove every closed listener, returning how many were removed
    pub fn prune(&self) -> usize {
        let mut listeners = self.lock();
        self.prune_locked(&mut listeners)
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn prune_locked(&self, listeners: &mut Vec<Listener>) -> usize {
        let before = listeners.len();
        listeners.retain(|listener| !listener.is_closed());
        let removed = before - listeners.len();
        if removed > 0 {
            self.metrics.record_pruned(removed);
            debug!(removed = removed, remaining = listeners.len(), "Pruned closed listeners");
        }
        removed
    }

    /// Prune, then queue `message` to each remaining listener without blocking
    pub(crate) fn broadcast_locked(&self, listeners: &mut Vec<Listener>, message: Arc<str>) {
        self.prune_locked(listeners);
        self.metrics.record_broadcast();

        let policy = self.policy;
        let metrics = &self.metrics;
        listeners.retain(|listener| match listener.try_send(Arc::clone(&message)) {
            Ok(()) => {
                metrics.record_delivery();
                true
            }
            Err(TrySendError::Full(_)) => match policy {
                SlowListenerPolicy::Drop => {
                    metrics.record_dropped();
                    warn!(listener_id = %listener.id, "Listener queue full, dropping update");
                    true
                }
                SlowListenerPolicy::Disconnect => {
                    metrics.record_disconnected();
                    warn!(listener_id = %listener.id, "Listener queue full, disconnecting");
                    false
                }
            },
            Err(TrySendError::Closed(_)) => {
                // Closed between prune and send
                metrics.record_pruned(1);
                false
            }
        });
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(SlowListenerPolicy::default())
    }
}
