//! # Stanza Gate Testkit
//!
//! Testing utilities for the stanza sequencing gate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a recording delivery target and a gate wired to it
//! - **Generators**: Proptest strategies for out-of-order arrival schedules
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use stanza_gate_testkit::{generators::arrival_order, GateFixture};
//!
//! proptest! {
//!     #[test]
//!     fn delivers_in_order(order in arrival_order(64)) {
//!         let fixture = GateFixture::new();
//!         fixture.feed("room", &order);
//!         let expected: Vec<u64> = (0..order.len() as u64).collect();
//!         prop_assert_eq!(fixture.delivered("room"), expected);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use stanza_gate_testkit::GateFixture;
//!
//! let fixture = GateFixture::new();
//! fixture.feed("room", &[2, 0, 1]);
//! assert_eq!(fixture.delivered("room"), vec![0, 1, 2]);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{principal_names, GateFixture, RecordingDelivery, TestGate};
pub use generators::{arrival_order, arrival_with_replays, deal, interleaved, permutation, shuffled};
