//! # Stanza Gate Core
//!
//! Pure primitives for the stanza sequencing gate: principals, stanzas, and the
//! per-principal reassembly state machine.
//!
//! This crate contains no locking, no I/O, no delivery. It is pure computation
//! over sequence numbers. The concurrent gate lives in `stanza-gate`.
//!
//! ## Key Types
//!
//! - [`Principal`] - Identity owning one independent sequencing stream
//! - [`Stanza`] - A unit of work bearing a sequence number and a principal
//! - [`Reassembly`] - Threshold + inbox for a single principal
//! - [`Admission`] - What happened to an item offered to a [`Reassembly`]
//! - [`LaneHealth`] - Whether a principal is blocked on a gap
//!
//! ## Reassembly
//!
//! ```rust
//! use stanza_gate_core::{Admission, Principal, Reassembly, Stanza};
//!
//! let room = Principal::new("room-1");
//! let mut lane = Reassembly::new();
//!
//! // 1 arrives before 0: parked.
//! let early = lane.accept(Stanza::new(room.clone(), 1, "b"));
//! assert!(matches!(early, Admission::Buffered { waiting_for: 0 }));
//!
//! // 0 closes the gap and releases 1 behind it.
//! match lane.accept(Stanza::new(room, 0, "a")) {
//!     Admission::Ready(run) => assert_eq!(run.len(), 2),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert_eq!(lane.threshold(), 2);
//! ```

pub mod error;
pub mod health;
pub mod reassembly;
pub mod types;

pub use error::{CoreError, Result};
pub use health::{LaneHealth, LaneSnapshot};
pub use reassembly::{Admission, Reassembly};
pub use types::{Principal, SeqNo, Sequenced, Stanza};
