//! Health of a principal's sequencing lane.

use serde::{Deserialize, Serialize};

use crate::types::{Principal, SeqNo};

/// Whether a principal is flowing freely or blocked on a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneHealth {
    /// Nothing buffered; the next in-order stanza is delivered on arrival.
    NoGap,

    /// Stanzas are parked behind a missing sequence number.
    GapPending {
        /// The missing sequence number blocking delivery.
        waiting_for: SeqNo,
        /// The smallest sequence number parked in the inbox.
        lowest_buffered: SeqNo,
        /// How many stanzas are parked.
        buffered: usize,
    },
}

impl LaneHealth {
    /// Check if the lane has no pending gap.
    pub fn is_gap_free(&self) -> bool {
        matches!(self, LaneHealth::NoGap)
    }

    /// Check if the lane is blocked on a gap.
    pub fn has_gap(&self) -> bool {
        matches!(self, LaneHealth::GapPending { .. })
    }

    /// Width of the missing range in front of the inbox, if any.
    pub fn gap_width(&self) -> Option<u64> {
        match self {
            LaneHealth::NoGap => None,
            LaneHealth::GapPending {
                waiting_for,
                lowest_buffered,
                ..
            } => Some(lowest_buffered.saturating_sub(*waiting_for)),
        }
    }
}

/// Point-in-time view of one principal's lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSnapshot {
    /// The principal the lane belongs to.
    pub principal: Principal,

    /// Next sequence number expected.
    pub threshold: SeqNo,

    /// Parked sequence numbers, ascending.
    pub pending: Vec<SeqNo>,

    /// Gap status.
    pub health: LaneHealth,
}
