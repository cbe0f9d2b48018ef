//! # Stanza Gate
//!
//! Ordered delivery of out-of-order stanzas. Every stanza carries a sequence
//! number and a principal; the gate hands stanzas for the same principal to
//! a [`Delivery`] target in strictly increasing sequence order, parking early
//! arrivals until the gap in front of them closes.
//!
//! ## Overview
//!
//! - **Principals are independent**: each has its own threshold and inbox;
//!   traffic for one never blocks another.
//! - **Non-blocking**: a missing sequence number parks later stanzas and the
//!   call returns. Nothing waits for a retransmission.
//! - **Exactly once, in order**: concurrent callers feeding the same
//!   principal still produce one ascending, gap-free delivery sequence.
//! - **Stale stanzas are dropped**: a sequence number below the threshold is
//!   never redelivered.
//!
//! ## Usage
//!
//! ```rust
//! use stanza_gate::{ChannelDelivery, Disposition, SequenceGate};
//! use stanza_gate_core::{Principal, Stanza};
//!
//! let (delivery, mut dispatcher) = ChannelDelivery::<String, &str>::channel();
//! let gate = SequenceGate::new(delivery);
//! let room = Principal::new("room-42");
//!
//! // 1 arrives first and waits for 0.
//! let early = gate.handle(Stanza::new(room.clone(), 1, "world"), "alice".into());
//! assert_eq!(early, Disposition::Buffered { waiting_for: 0 });
//!
//! // 0 releases both.
//! gate.handle(Stanza::new(room.clone(), 0, "hello"), "alice".into());
//! assert_eq!(gate.threshold(&room), Some(2));
//!
//! let (first, _) = dispatcher.try_recv().unwrap();
//! let (second, _) = dispatcher.try_recv().unwrap();
//! assert_eq!((first.seq(), second.seq()), (0, 1));
//! ```
//!
//! ## Idle eviction
//!
//! A gap that never closes leaves its inbox growing. Configure
//! [`GateConfig::idle_timeout`] and run [`spawn_sweeper`] to drop lanes that
//! have been quiet for too long; an evicted principal restarts at 0.

pub mod config;
pub mod delivery;
pub mod error;
pub mod gate;
pub mod stats;
pub mod sweeper;

// Re-export the core crate
pub use stanza_gate_core as core;

pub use config::GateConfig;
pub use delivery::{delivery_fn, ChannelDelivery, Delivery, FnDelivery};
pub use error::{GateError, Result};
pub use gate::{Disposition, SequenceGate};
pub use stats::GateStats;
pub use sweeper::spawn_sweeper;

// Re-export commonly used core types
pub use stanza_gate_core::{LaneHealth, LaneSnapshot, Principal, SeqNo, Stanza};
