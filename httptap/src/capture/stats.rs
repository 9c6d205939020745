//! Capture-side counters
//!
//! The engine never logs from a probe. These counters are the only record of
//! what was dropped, and mirror the kernel's per-CPU `STATS` map.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CaptureStats {
    submitted: AtomicU64,
    dropped_no_space: AtomicU64,
    discarded: AtomicU64,
    pending_refused: AtomicU64,
    correlation_misses: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub dropped_no_space: u64,
    pub discarded: u64,
    pub pending_refused: u64,
    pub correlation_misses: u64,
}

impl StatsSnapshot {
    /// Events that matched the classifier but never reached the consumer
    pub fn lost(&self) -> u64 {
        self.dropped_no_space + self.discarded
    }
}

impl CaptureStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_no_space: self.dropped_no_space.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            pending_refused: self.pending_refused.load(Ordering::Relaxed),
            correlation_misses: self.correlation_misses.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_no_space(&self) {
        self.dropped_no_space.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pending_refused(&self) {
        self.pending_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_correlation_miss(&self) {
        self.correlation_misses.fetch_add(1, Ordering::Relaxed);
    }
}
