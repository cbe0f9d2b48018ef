//! Reassembly: the per-principal threshold and out-of-order inbox.
//!
//! A `Reassembly` is a plain state machine. It does no locking; the gate wraps
//! one per principal in a mutex.

use std::collections::BTreeMap;

use crate::health::LaneHealth;
use crate::types::{SeqNo, Sequenced};

/// Outcome of offering an item to a [`Reassembly`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission<T> {
    /// The item matched the threshold. Holds it plus every buffered successor
    /// that became contiguous, in ascending order. The threshold has already
    /// moved past all of them.
    Ready(Vec<T>),
    /// The item is ahead of the threshold and was parked in the inbox.
    Buffered {
        /// The sequence number still missing.
        waiting_for: SeqNo,
    },
    /// The inbox already holds an item at this sequence number. The new one
    /// was dropped.
    Duplicate,
    /// The item is below the threshold: already delivered or superseded.
    Stale {
        /// The threshold at the time of arrival.
        threshold: SeqNo,
    },
    /// The item is ahead of the threshold but the inbox is at capacity.
    Overflow {
        /// The sequence number still missing.
        waiting_for: SeqNo,
    },
}

impl<T> Admission<T> {
    /// Number of items released for delivery.
    pub fn released(&self) -> usize {
        match self {
            Admission::Ready(run) => run.len(),
            _ => 0,
        }
    }
}

/// Threshold plus inbox for a single principal.
///
/// Invariants:
/// - `threshold` never decreases.
/// - every key in the inbox is strictly greater than `threshold`.
/// - the inbox is `None` whenever it would be empty.
#[derive(Debug, Clone)]
pub struct Reassembly<T> {
    /// Next sequence number expected.
    threshold: SeqNo,

    /// Items that arrived ahead of the threshold, keyed by sequence number.
    inbox: Option<BTreeMap<SeqNo, T>>,
}

impl<T: Sequenced> Reassembly<T> {
    /// Start a fresh stream expecting sequence number 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start a stream expecting `threshold` next.
    pub fn starting_at(threshold: SeqNo) -> Self {
        Self {
            threshold,
            inbox: None,
        }
    }

    /// Offer an item with no bound on the inbox.
    pub fn accept(&mut self, item: T) -> Admission<T> {
        self.accept_bounded(item, None)
    }

    /// Offer an item, refusing to grow the inbox past `max_pending` entries.
    ///
    /// An item matching the threshold is never refused, whatever the bound.
    pub fn accept_bounded(&mut self, item: T, max_pending: Option<usize>) -> Admission<T> {
        let seq = item.seq();

        // Case 1: stale or replayed
        if seq < self.threshold {
            return Admission::Stale {
                threshold: self.threshold,
            };
        }

        // Case 2: ahead of the threshold, park it
        if seq > self.threshold {
            let waiting_for = self.threshold;
            let inbox = self.inbox.get_or_insert_with(BTreeMap::new);

            if inbox.contains_key(&seq) {
                return Admission::Duplicate;
            }
            if max_pending.is_some_and(|max| inbox.len() >= max) {
                if inbox.is_empty() {
                    self.inbox = None;
                }
                return Admission::Overflow { waiting_for };
            }

            inbox.insert(seq, item);
            return Admission::Buffered { waiting_for };
        }

        // Case 3: exactly the threshold, release it and whatever follows
        self.threshold += 1;
        let mut run = vec![item];
        self.drain_into(&mut run);
        Admission::Ready(run)
    }

    /// Move every inbox entry contiguous with the threshold into `run`.
    fn drain_into(&mut self, run: &mut Vec<T>) {
        let Some(inbox) = self.inbox.as_mut() else {
            return;
        };

        while let Some(item) = inbox.remove(&self.threshold) {
            run.push(item);
            self.threshold += 1;
        }

        if inbox.is_empty() {
            self.inbox = None;
        }
    }

    /// The next sequence number expected.
    pub fn threshold(&self) -> SeqNo {
        self.threshold
    }

    /// Whether an inbox currently exists (a gap is pending).
    pub fn has_inbox(&self) -> bool {
        self.inbox.is_some()
    }

    /// Number of items parked ahead of the threshold.
    pub fn pending_len(&self) -> usize {
        self.inbox.as_ref().map_or(0, BTreeMap::len)
    }

    /// Sequence numbers parked ahead of the threshold, ascending.
    pub fn pending_seqs(&self) -> Vec<SeqNo> {
        self.inbox
            .as_ref()
            .map(|inbox| inbox.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Current gap status.
    pub fn health(&self) -> LaneHealth {
        match self.inbox.as_ref().and_then(|inbox| inbox.keys().next()) {
            None => LaneHealth::NoGap,
            Some(&lowest_buffered) => LaneHealth::GapPending {
                waiting_for: self.threshold,
                lowest_buffered,
                buffered: self.pending_len(),
            },
        }
    }
}

impl<T: Sequenced> Default for Reassembly<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Principal, Stanza};
    use proptest::prelude::*;

    fn stanza(seq: SeqNo) -> Stanza<&'static str> {
        Stanza::new(Principal::new("test"), seq, "payload")
    }

    fn seqs(admission: Admission<Stanza<&'static str>>) -> Vec<SeqNo> {
        match admission {
            Admission::Ready(run) => run.iter().map(|s| s.seq()).collect(),
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_in_order_never_creates_inbox() {
        let mut lane = Reassembly::new();
        for seq in 0..10 {
            assert_eq!(seqs(lane.accept(stanza(seq))), vec![seq]);
            assert!(!lane.has_inbox());
        }
        assert_eq!(lane.threshold(), 10);
    }

    #[test]
    fn test_single_gap_filled_from_behind() {
        let mut lane = Reassembly::new();

        assert_eq!(
            lane.accept(stanza(1)),
            Admission::Buffered { waiting_for: 0 }
        );
        assert_eq!(lane.threshold(), 0);
        assert_eq!(lane.pending_seqs(), vec![1]);

        assert_eq!(seqs(lane.accept(stanza(0))), vec![0, 1]);
        assert_eq!(lane.threshold(), 2);
        assert!(!lane.has_inbox());

        assert_eq!(seqs(lane.accept(stanza(2))), vec![2]);
        assert_eq!(lane.threshold(), 3);
        assert!(!lane.has_inbox());
    }

    #[test]
    fn test_wide_gap_filled_out_of_order() {
        let mut lane = Reassembly::new();

        lane.accept(stanza(0));
        lane.accept(stanza(3));
        assert_eq!(lane.threshold(), 1);
        assert_eq!(lane.pending_seqs(), vec![3]);

        assert_eq!(seqs(lane.accept(stanza(1))), vec![1]);
        assert_eq!(lane.threshold(), 2);
        assert_eq!(lane.pending_seqs(), vec![3]);

        assert_eq!(seqs(lane.accept(stanza(2))), vec![2, 3]);
        assert_eq!(lane.threshold(), 4);
        assert!(!lane.has_inbox());
    }

    #[test]
    fn test_interleaved_gaps() {
        let mut lane = Reassembly::new();

        for seq in [0, 2, 4, 5] {
            lane.accept(stanza(seq));
        }
        assert_eq!(lane.threshold(), 1);
        assert_eq!(lane.pending_seqs(), vec![2, 4, 5]);

        assert_eq!(seqs(lane.accept(stanza(1))), vec![1, 2]);
        assert_eq!(lane.threshold(), 3);
        assert_eq!(lane.pending_seqs(), vec![4, 5]);

        assert_eq!(seqs(lane.accept(stanza(3))), vec![3, 4, 5]);
        assert_eq!(lane.threshold(), 6);
        assert!(!lane.has_inbox());
    }

    #[test]
    fn test_stale_is_refused() {
        let mut lane = Reassembly::new();
        lane.accept(stanza(0));
        lane.accept(stanza(1));

        assert_eq!(lane.accept(stanza(0)), Admission::Stale { threshold: 2 });
        assert_eq!(lane.threshold(), 2);
        assert!(!lane.has_inbox());
    }

    #[test]
    fn test_duplicate_in_inbox_keeps_first() {
        let mut lane = Reassembly::new();
        lane.accept(Stanza::new(Principal::new("test"), 2, "first"));

        let again = lane.accept(Stanza::new(Principal::new("test"), 2, "second"));
        assert_eq!(again, Admission::Duplicate);
        assert_eq!(lane.pending_len(), 1);

        lane.accept(stanza(0));
        match lane.accept(stanza(1)) {
            Admission::Ready(run) => assert_eq!(*run[1].payload(), "first"),
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_bounded_inbox_overflows() {
        let mut lane = Reassembly::new();

        assert_eq!(
            lane.accept_bounded(stanza(1), Some(2)),
            Admission::Buffered { waiting_for: 0 }
        );
        assert_eq!(
            lane.accept_bounded(stanza(2), Some(2)),
            Admission::Buffered { waiting_for: 0 }
        );
        assert_eq!(
            lane.accept_bounded(stanza(3), Some(2)),
            Admission::Overflow { waiting_for: 0 }
        );
        assert_eq!(lane.pending_seqs(), vec![1, 2]);

        // The threshold stanza still gets through when the inbox is full.
        assert_eq!(seqs(lane.accept_bounded(stanza(0), Some(2))), vec![0, 1, 2]);
        assert_eq!(lane.threshold(), 3);
    }

    #[test]
    fn test_zero_capacity_leaves_no_inbox() {
        let mut lane = Reassembly::new();
        assert_eq!(
            lane.accept_bounded(stanza(5), Some(0)),
            Admission::Overflow { waiting_for: 0 }
        );
        assert!(!lane.has_inbox());
    }

    #[test]
    fn test_health_tracks_gap() {
        let mut lane = Reassembly::new();
        assert!(lane.health().is_gap_free());

        lane.accept(stanza(3));
        lane.accept(stanza(5));
        assert_eq!(
            lane.health(),
            LaneHealth::GapPending {
                waiting_for: 0,
                lowest_buffered: 3,
                buffered: 2,
            }
        );
    }

    #[test]
    fn test_starting_at() {
        let mut lane = Reassembly::starting_at(10);
        assert_eq!(lane.accept(stanza(9)), Admission::Stale { threshold: 10 });
        assert_eq!(seqs(lane.accept(stanza(10))), vec![10]);
    }

    proptest! {
        #[test]
        fn test_any_permutation_releases_in_order(
            order in Just((0u64..64).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let mut lane = Reassembly::new();
            let mut released = Vec::new();

            for seq in order {
                if let Admission::Ready(run) = lane.accept(stanza(seq)) {
                    released.extend(run.iter().map(|s| s.seq()));
                }
            }

            prop_assert_eq!(released, (0u64..64).collect::<Vec<_>>());
            prop_assert_eq!(lane.threshold(), 64);
            prop_assert!(!lane.has_inbox());
        }

        #[test]
        fn test_threshold_is_monotonic(arrivals in prop::collection::vec(0u64..32, 0..128)) {
            let mut lane = Reassembly::new();
            let mut last = lane.threshold();

            for seq in arrivals {
                lane.accept(stanza(seq));
                prop_assert!(lane.threshold() >= last);
                prop_assert!(lane.pending_seqs().iter().all(|&s| s > lane.threshold()));
                last = lane.threshold();
            }
        }
    }
}
