//! Gate-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of a gate's counters since it was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    /// Stanzas handed to the delivery target (including failed attempts).
    pub delivered: u64,
    /// Stanzas parked in an inbox on arrival.
    pub buffered: u64,
    /// Stanzas dropped because the inbox already held their sequence number.
    pub duplicates: u64,
    /// Stanzas dropped because they were below the threshold.
    pub stale: u64,
    /// Stanzas dropped because the inbox was full.
    pub overflowed: u64,
    /// Delivery attempts that returned an error.
    pub delivery_failures: u64,
    /// Lanes removed by idle eviction.
    pub evicted: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) delivered: AtomicU64,
    pub(crate) buffered: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) stale: AtomicU64,
    pub(crate) overflowed: AtomicU64,
    pub(crate) delivery_failures: AtomicU64,
    pub(crate) evicted: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GateStats {
        GateStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            buffered: self.buffered.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}
