use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Tracks broadcast activity for the hub
#[derive(Clone, Default)]
pub struct HubMetrics {
    /// Notify sweeps performed (one per set/update)
    broadcasts: Arc<AtomicU64>,

    /// Messages successfully queued to a listener
    deliveries: Arc<AtomicU64>,

    /// Messages dropped because a listener's queue was full
    dropped: Arc<AtomicU64>,

    /// Listeners removed by the disconnect policy
    disconnected: Arc<AtomicU64>,

    /// Closed listeners removed by prune
    pruned: Arc<AtomicU64>,

    /// Listeners ever registered
    subscriptions: Arc<AtomicU64>,

    /// Millis since epoch of the last broadcast (0 = never)
    last_broadcast_ms: Arc<AtomicI64>,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.last_broadcast_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnected(&self) {
        self.disconnected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruned(&self, count: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn get_snapshot(&self) -> MetricsSnapshot {
        let last_ms = self.last_broadcast_ms.load(Ordering::Relaxed);
        let last_broadcast = if last_ms == 0 {
            None
        } else {
            Utc.timestamp_millis_opt(last_ms).single()
        };

        MetricsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            disconnected: self.disconnected.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            last_broadcast,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub broadcasts: u64,
    pub deliveries: u64,
    pub dropped: u64,
    pub disconnected: u64,
    pub pruned: u64,
    pub subscriptions: u64,
    pub last_broadcast: Option<DateTime<Utc>>,
}
