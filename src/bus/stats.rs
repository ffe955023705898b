//! Bus statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracked by the event bus
///
/// All counters are monotonic and updated with relaxed ordering; they are
/// diagnostics, not part of any delivery guarantee.
#[derive(Debug, Default)]
pub struct BusStats {
    /// Envelopes accepted by `publish` (excluding audit mirrors)
    pub published: AtomicU64,
    /// Audit mirrors sent to the audit topic
    pub audited: AtomicU64,
    /// Handler invocations that completed successfully
    pub dispatched: AtomicU64,
    /// Handler invocations that returned an error
    pub handler_failures: AtomicU64,
    /// Transport messages dropped because they could not be decoded
    pub decode_failures: AtomicU64,
    /// Publishes that found no live listener on the topic
    pub dropped: AtomicU64,
}

/// Point-in-time snapshot of [`BusStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub published: u64,
    pub audited: u64,
    pub dispatched: u64,
    pub handler_failures: u64,
    pub decode_failures: u64,
    pub dropped: u64,
}

impl BusStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            audited: self.audited.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub(super) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
