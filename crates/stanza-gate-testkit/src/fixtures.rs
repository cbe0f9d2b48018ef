//! Test fixtures and helpers.
//!
//! Common setup code for gate tests: a delivery target that records what it
//! was given, and a gate pre-wired to it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use stanza_gate::{Delivery, Disposition, GateConfig, SequenceGate};
use stanza_gate_core::{Principal, SeqNo, Stanza};

/// Delivery target that records `(principal, seq)` in call order.
///
/// Clones share the same log, so keep one clone for assertions and hand the
/// other to the gate. It also notices if the gate ever runs two deliveries
/// for the same principal at once.
#[derive(Clone, Default)]
pub struct RecordingDelivery {
    inner: Arc<Recorder>,
}

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<(Principal, SeqNo)>>,
    in_flight: Mutex<HashSet<Principal>>,
    overlaps: AtomicUsize,
    fail_on: HashSet<SeqNo>,
    delay: Option<Duration>,
}

impl RecordingDelivery {
    /// A recorder that accepts everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that sleeps for `delay` inside every delivery, widening
    /// race windows in concurrency tests.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Recorder {
                delay: Some(delay),
                ..Recorder::default()
            }),
        }
    }

    /// A recorder whose delivery fails for the given sequence numbers.
    /// Failed deliveries are still recorded.
    pub fn failing_on(seqs: impl IntoIterator<Item = SeqNo>) -> Self {
        Self {
            inner: Arc::new(Recorder {
                fail_on: seqs.into_iter().collect(),
                ..Recorder::default()
            }),
        }
    }

    /// Everything delivered so far, in call order.
    pub fn log(&self) -> Vec<(Principal, SeqNo)> {
        self.inner.log.lock().clone()
    }

    /// Sequence numbers delivered for one principal, in call order.
    pub fn delivered_to(&self, principal: &Principal) -> Vec<SeqNo> {
        self.inner
            .log
            .lock()
            .iter()
            .filter(|(p, _)| p == principal)
            .map(|(_, seq)| *seq)
            .collect()
    }

    /// Total deliveries across all principals.
    pub fn count(&self) -> usize {
        self.inner.log.lock().len()
    }

    /// How many times a delivery started while another for the same
    /// principal was still running. Must stay 0.
    pub fn overlaps(&self) -> usize {
        self.inner.overlaps.load(Ordering::SeqCst)
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.inner.log.lock().clear();
    }
}

impl<R, P> Delivery<R, P> for RecordingDelivery {
    fn deliver(&self, stanza: Stanza<P>, _recipient: &R) -> anyhow::Result<()> {
        let principal = stanza.principal().clone();
        let seq = stanza.seq();

        if !self.inner.in_flight.lock().insert(principal.clone()) {
            self.inner.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(delay) = self.inner.delay {
            std::thread::sleep(delay);
        }
        self.inner.log.lock().push((principal.clone(), seq));
        self.inner.in_flight.lock().remove(&principal);

        if self.inner.fail_on.contains(&seq) {
            anyhow::bail!("injected failure at seq {}", seq);
        }
        Ok(())
    }
}

/// Gate type used throughout the tests: unit recipient, byte payloads.
pub type TestGate = SequenceGate<(), Bytes, RecordingDelivery>;

/// A gate wired to a [`RecordingDelivery`].
pub struct GateFixture {
    pub gate: TestGate,
    pub recorder: RecordingDelivery,
}

impl GateFixture {
    /// Fixture with default gate configuration.
    pub fn new() -> Self {
        Self::with_recorder(RecordingDelivery::new())
    }

    /// Fixture around a pre-configured recorder.
    pub fn with_recorder(recorder: RecordingDelivery) -> Self {
        Self {
            gate: SequenceGate::new(recorder.clone()),
            recorder,
        }
    }

    /// Fixture with a custom gate configuration.
    pub fn with_config(config: GateConfig) -> Self {
        let recorder = RecordingDelivery::new();
        Self {
            gate: SequenceGate::with_config(recorder.clone(), config)
                .expect("fixture config must be valid"),
            recorder,
        }
    }

    /// Build a stanza whose payload spells out its position.
    pub fn stanza(principal: &str, seq: SeqNo) -> Stanza<Bytes> {
        Stanza::new(
            Principal::new(principal),
            seq,
            Bytes::from(format!("{principal}#{seq}")),
        )
    }

    /// Feed one stanza.
    pub fn send(&self, principal: &str, seq: SeqNo) -> Disposition {
        self.gate.handle(Self::stanza(principal, seq), ())
    }

    /// Feed stanzas in the given order.
    pub fn feed(&self, principal: &str, seqs: &[SeqNo]) -> Vec<Disposition> {
        seqs.iter().map(|&seq| self.send(principal, seq)).collect()
    }

    /// Sequence numbers delivered for `principal`.
    pub fn delivered(&self, principal: &str) -> Vec<SeqNo> {
        self.recorder.delivered_to(&Principal::new(principal))
    }

    /// Current threshold for `principal`.
    pub fn threshold(&self, principal: &str) -> Option<SeqNo> {
        self.gate.threshold(&Principal::new(principal))
    }

    /// Parked sequence numbers for `principal`.
    pub fn pending(&self, principal: &str) -> Option<Vec<SeqNo>> {
        self.gate.pending(&Principal::new(principal))
    }
}

impl Default for GateFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Distinct principal names for multi-principal tests.
pub fn principal_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("principal-{i}")).collect()
}
