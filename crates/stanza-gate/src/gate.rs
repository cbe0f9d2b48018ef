//! The SequenceGate: in-order delivery of out-of-order stanzas, per principal.
//!
//! Each principal gets a lane: a [`Reassembly`] behind its own mutex, an
//! outbox of stanzas released for delivery, and a flag marking whether some
//! thread is currently delivering them. Lanes live in a sharded map, so
//! traffic for different principals never contends on the same lock.
//!
//! ## Delivery discipline
//!
//! ```text
//!  handle(s) ──lock──► accept ──Ready(run)──► outbox += run
//!                                                │
//!                          draining already? ────┤── yes ─► Deferred
//!                                                │
//!                                                no
//!                                                ▼
//!                     ┌── take outbox ◄── relock ◄── deliver (unlocked)
//!                     └── empty? ─► draining = false ─► Delivered
//! ```
//!
//! The threshold moves inside the critical section, before delivery starts,
//! so exactly one caller consumes each sequence number. Only the drainer
//! invokes the delivery target, and the outbox is FIFO, so calls are strictly
//! ascending even when many threads feed the same principal.

use std::any::Any;
use std::collections::VecDeque;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use stanza_gate_core::{Admission, LaneSnapshot, Principal, Reassembly, SeqNo, Sequenced, Stanza};

use crate::config::GateConfig;
use crate::delivery::Delivery;
use crate::error::Result;
use crate::stats::{Counters, GateStats};

/// What `handle` did with a stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// This call delivered `delivered` stanzas (the incoming one, buffered
    /// successors, and anything other threads released meanwhile).
    /// `failed` of those attempts returned an error or panicked.
    Delivered { delivered: usize, failed: usize },
    /// The stanza was deliverable but another thread is draining this
    /// principal; it will deliver it.
    Deferred,
    /// Parked behind a gap.
    Buffered { waiting_for: SeqNo },
    /// Dropped: a stanza with this sequence number is already parked.
    Duplicate,
    /// Dropped: below the threshold, already accounted for.
    Stale { threshold: SeqNo },
    /// Dropped: the principal's inbox is full.
    Overflow { waiting_for: SeqNo },
}

impl Disposition {
    /// True if the stanza will reach the delivery target (now or via the
    /// active drainer, or later once its gap closes).
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            Disposition::Delivered { .. } | Disposition::Deferred | Disposition::Buffered { .. }
        )
    }

    /// True if the stanza was dropped.
    pub fn is_dropped(&self) -> bool {
        !self.is_accepted()
    }
}

/// A stanza together with the recipient it arrived for.
struct Envelope<R, P> {
    stanza: Stanza<P>,
    recipient: R,
}

impl<R, P> Sequenced for Envelope<R, P> {
    fn seq(&self) -> SeqNo {
        self.stanza.seq()
    }
}

/// Per-principal state.
struct Lane<R, P> {
    /// Lock-free mirror of the reassembly threshold, for readers.
    threshold: AtomicU64,
    state: Mutex<LaneState<R, P>>,
}

struct LaneState<R, P> {
    reassembly: Reassembly<Envelope<R, P>>,
    /// Released by the reassembly, not yet handed to delivery.
    outbox: VecDeque<Envelope<R, P>>,
    /// Some thread is delivering this lane's outbox.
    draining: bool,
    /// Removed from the gate; callers holding a stale handle must re-resolve.
    evicted: bool,
    last_activity: Instant,
}

impl<R, P> Lane<R, P> {
    fn new() -> Self {
        Self {
            threshold: AtomicU64::new(0),
            state: Mutex::new(LaneState {
                reassembly: Reassembly::new(),
                outbox: VecDeque::new(),
                draining: false,
                evicted: false,
                last_activity: Instant::now(),
            }),
        }
    }

    /// Publish a threshold advance. Called with the lane lock held, so the
    /// exchange can only fail if the mirror was written elsewhere.
    fn advance(&self, from: SeqNo, to: SeqNo) {
        let swapped = self
            .threshold
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire);
        debug_assert!(swapped.is_ok(), "threshold mirror out of sync");
    }

    fn snapshot(&self, principal: &Principal) -> LaneSnapshot {
        let state = self.state.lock();
        LaneSnapshot {
            principal: principal.clone(),
            threshold: state.reassembly.threshold(),
            pending: state.reassembly.pending_seqs(),
            health: state.reassembly.health(),
        }
    }
}

/// Clears the draining flag when the drainer finishes or unwinds.
struct Draining<'a, R, P> {
    state: MutexGuard<'a, LaneState<R, P>>,
}

impl<R, P> Drop for Draining<'_, R, P> {
    fn drop(&mut self) {
        self.state.draining = false;
        self.state.last_activity = Instant::now();
    }
}

/// Delivers stanzas to `D` in strictly increasing sequence order per principal.
///
/// `R` is the recipient handed back with each stanza, `P` the stanza payload.
/// Share the gate across threads with an `Arc`; all methods take `&self`.
pub struct SequenceGate<R, P, D> {
    lanes: DashMap<Principal, Arc<Lane<R, P>>>,
    delivery: D,
    config: GateConfig,
    counters: Counters,
}

impl<R, P, D> SequenceGate<R, P, D>
where
    D: Delivery<R, P>,
{
    /// Create a gate with default configuration.
    pub fn new(delivery: D) -> Self {
        Self {
            lanes: DashMap::new(),
            delivery,
            config: GateConfig::default(),
            counters: Counters::default(),
        }
    }

    /// Create a gate with a validated configuration.
    pub fn with_config(delivery: D, config: GateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(delivery)
        })
    }

    /// The gate's configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The delivery target.
    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingest
    // ─────────────────────────────────────────────────────────────────────────

    /// Offer a stanza for in-order delivery to `recipient`.
    ///
    /// Never blocks on a missing sequence number: a stanza ahead of the
    /// threshold is parked and the call returns. Delivery target failures do
    /// not roll the threshold back; they are logged and counted. A panicking
    /// target is treated as a failed delivery and the drain carries on.
    pub fn handle(&self, stanza: Stanza<P>, recipient: R) -> Disposition {
        let principal = stanza.principal().clone();
        let envelope = Envelope { stanza, recipient };

        loop {
            let lane = self.lane(&principal);
            let state = lane.state.lock();
            if state.evicted {
                // Lost a race with eviction; the map now holds a fresh lane.
                continue;
            }
            return self.admit(&principal, &lane, state, envelope);
        }
    }

    /// Resolve or create the lane for `principal`.
    fn lane(&self, principal: &Principal) -> Arc<Lane<R, P>> {
        if let Some(lane) = self.lanes.get(principal) {
            return Arc::clone(lane.value());
        }

        let lane = self.lanes.entry(principal.clone()).or_insert_with(|| {
            debug!(principal = %principal, "opening sequencing lane");
            Arc::new(Lane::new())
        });
        Arc::clone(lane.value())
    }

    fn admit(
        &self,
        principal: &Principal,
        lane: &Lane<R, P>,
        mut state: MutexGuard<'_, LaneState<R, P>>,
        envelope: Envelope<R, P>,
    ) -> Disposition {
        let seq = envelope.seq();
        let before = state.reassembly.threshold();
        state.last_activity = Instant::now();

        let admission = state
            .reassembly
            .accept_bounded(envelope, self.config.max_pending_per_principal);

        match admission {
            Admission::Ready(run) => {
                lane.advance(before, state.reassembly.threshold());
                state.outbox.extend(run);

                if state.draining {
                    trace!(principal = %principal, seq, "handing off to active drainer");
                    return Disposition::Deferred;
                }

                state.draining = true;
                self.drain(principal, state)
            }
            Admission::Buffered { waiting_for } => {
                Counters::bump(&self.counters.buffered, 1);
                debug!(
                    principal = %principal,
                    seq,
                    waiting_for,
                    pending = state.reassembly.pending_len(),
                    "stanza ahead of threshold, buffering"
                );
                Disposition::Buffered { waiting_for }
            }
            Admission::Duplicate => {
                Counters::bump(&self.counters.duplicates, 1);
                debug!(principal = %principal, seq, "duplicate of a buffered stanza, dropping");
                Disposition::Duplicate
            }
            Admission::Stale { threshold } => {
                Counters::bump(&self.counters.stale, 1);
                warn!(principal = %principal, seq, threshold, "stale stanza, dropping");
                Disposition::Stale { threshold }
            }
            Admission::Overflow { waiting_for } => {
                Counters::bump(&self.counters.overflowed, 1);
                warn!(
                    principal = %principal,
                    seq,
                    waiting_for,
                    "inbox full, dropping stanza"
                );
                Disposition::Overflow { waiting_for }
            }
        }
    }

    /// Deliver the lane's outbox until it stays empty.
    ///
    /// The lock is released around each batch so other threads can keep
    /// admitting stanzas; whatever they release lands in the outbox and is
    /// picked up by the next iteration.
    fn drain(
        &self,
        principal: &Principal,
        state: MutexGuard<'_, LaneState<R, P>>,
    ) -> Disposition {
        let mut guard = Draining { state };
        let mut delivered = 0usize;
        let mut failed = 0usize;

        loop {
            let batch = mem::take(&mut guard.state.outbox);
            if batch.is_empty() {
                break;
            }

            MutexGuard::unlocked(&mut guard.state, || {
                for envelope in batch {
                    let seq = envelope.stanza.seq();
                    trace!(principal = %principal, seq, "delivering stanza");
                    delivered += 1;
                    Counters::bump(&self.counters.delivered, 1);

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.delivery.deliver(envelope.stanza, &envelope.recipient)
                    }));
                    let error = match outcome {
                        Ok(Ok(())) => continue,
                        Ok(Err(e)) => e.to_string(),
                        Err(payload) => format!("panicked: {}", panic_message(&*payload)),
                    };

                    failed += 1;
                    Counters::bump(&self.counters.delivery_failures, 1);
                    warn!(
                        principal = %principal,
                        seq,
                        error = %error,
                        "delivery failed, stanza consumed"
                    );
                }
            });
        }

        Disposition::Delivered { delivered, failed }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Next sequence number expected for `principal`, or `None` if the gate
    /// has never seen it.
    pub fn threshold(&self, principal: &Principal) -> Option<SeqNo> {
        self.lanes
            .get(principal)
            .map(|lane| lane.threshold.load(Ordering::Acquire))
    }

    /// Sequence numbers parked for `principal`, ascending. `None` when the
    /// principal has no inbox (no gap pending, or never seen).
    pub fn pending(&self, principal: &Principal) -> Option<Vec<SeqNo>> {
        let lane = self.lanes.get(principal).map(|l| Arc::clone(l.value()))?;
        let state = lane.state.lock();
        state
            .reassembly
            .has_inbox()
            .then(|| state.reassembly.pending_seqs())
    }

    /// Point-in-time view of one principal's lane.
    pub fn snapshot(&self, principal: &Principal) -> Option<LaneSnapshot> {
        let lane = self.lanes.get(principal).map(|l| Arc::clone(l.value()))?;
        Some(lane.snapshot(principal))
    }

    /// Point-in-time views of every lane, ordered by principal.
    pub fn snapshots(&self) -> Vec<LaneSnapshot> {
        let lanes: Vec<_> = self
            .lanes
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut snapshots: Vec<_> = lanes
            .iter()
            .map(|(principal, lane)| lane.snapshot(principal))
            .collect();
        snapshots.sort_by(|a, b| a.principal.cmp(&b.principal));
        snapshots
    }

    /// Principals with a live lane.
    pub fn principals(&self) -> Vec<Principal> {
        self.lanes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of live lanes.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// True if no principal has been seen (or all were evicted).
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> GateStats {
        self.counters.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Drop a principal's lane, discarding anything parked. Its next stanza
    /// starts a fresh stream at threshold 0.
    pub fn remove(&self, principal: &Principal) -> bool {
        self.lanes
            .remove_if(principal, |_, lane| {
                let mut state = lane.state.lock();
                state.evicted = true;
                debug!(
                    principal = %principal,
                    threshold = state.reassembly.threshold(),
                    discarded = state.reassembly.pending_len(),
                    "removing sequencing lane"
                );
                true
            })
            .is_some()
    }

    /// Evict lanes stuck on a gap with no activity for at least `max_idle`.
    ///
    /// Only lanes holding an inbox are candidates: a gap-free lane keeps its
    /// threshold so a sender that merely pauses resumes where it left off.
    /// Lanes that are locked or mid-delivery are skipped. Returns the number
    /// of lanes removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = 0usize;

        self.lanes.retain(|principal, lane| {
            let Some(mut state) = lane.state.try_lock() else {
                return true;
            };
            if state.draining
                || !state.reassembly.has_inbox()
                || now.duration_since(state.last_activity) < max_idle
            {
                return true;
            }

            warn!(
                principal = %principal,
                waiting_for = state.reassembly.threshold(),
                discarded = state.reassembly.pending_len(),
                "evicting idle lane stuck on a gap"
            );

            state.evicted = true;
            evicted += 1;
            false
        });

        Counters::bump(&self.counters.evicted, evicted as u64);
        evicted
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
