//! Process-wide counters for observability.
//!
//! Plain atomics exposed through one global handle, the same shape the
//! teacher uses — no external metrics backend, just numbers `tracing` spans
//! and an eventual status endpoint can read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance, creating it on first use.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Process-wide counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Activities accepted by the Activity Engine.
    pub activities_applied: AtomicU64,
    /// Activities ignored as stale (superseded `updated` timestamp).
    pub activities_stale: AtomicU64,
    /// Inbox items verified and applied successfully.
    pub inbox_processed: AtomicU64,
    /// Inbox items dropped after exhausting retries or on terminal error.
    pub inbox_terminal: AtomicU64,
    /// Deliveries that succeeded.
    pub deliveries_succeeded: AtomicU64,
    /// Deliveries that failed permanently.
    pub deliveries_terminal: AtomicU64,
    /// Remote actor cache hits.
    pub actor_cache_hits: AtomicU64,
    /// Remote actor cache misses.
    pub actor_cache_misses: AtomicU64,
    /// Registrations completed.
    pub registrations_completed: AtomicU64,
    /// Requests rejected for being throttled.
    pub throttle_rejections: AtomicU64,
}

impl Metrics {
    /// Construct a fresh, zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a point-in-time snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            activities_applied: self.activities_applied.load(Ordering::Relaxed),
            activities_stale: self.activities_stale.load(Ordering::Relaxed),
            inbox_processed: self.inbox_processed.load(Ordering::Relaxed),
            inbox_terminal: self.inbox_terminal.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_terminal: self.deliveries_terminal.load(Ordering::Relaxed),
            actor_cache_hits: self.actor_cache_hits.load(Ordering::Relaxed),
            actor_cache_misses: self.actor_cache_misses.load(Ordering::Relaxed),
            registrations_completed: self.registrations_completed.load(Ordering::Relaxed),
            throttle_rejections: self.throttle_rejections.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`Metrics`], suitable for serialization.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// See [`Metrics::activities_applied`].
    pub activities_applied: u64,
    /// See [`Metrics::activities_stale`].
    pub activities_stale: u64,
    /// See [`Metrics::inbox_processed`].
    pub inbox_processed: u64,
    /// See [`Metrics::inbox_terminal`].
    pub inbox_terminal: u64,
    /// See [`Metrics::deliveries_succeeded`].
    pub deliveries_succeeded: u64,
    /// See [`Metrics::deliveries_terminal`].
    pub deliveries_terminal: u64,
    /// See [`Metrics::actor_cache_hits`].
    pub actor_cache_hits: u64,
    /// See [`Metrics::actor_cache_misses`].
    pub actor_cache_misses: u64,
    /// See [`Metrics::registrations_completed`].
    pub registrations_completed: u64,
    /// See [`Metrics::throttle_rejections`].
    pub throttle_rejections: u64,
}
