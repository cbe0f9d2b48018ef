//! Single-threaded ordering behaviour of the gate.
//!
//! Each scenario checks threshold and inbox after every call, not just the
//! final delivery order.

use proptest::prelude::*;
use stanza_gate::{Disposition, GateConfig, LaneHealth};
use stanza_gate_testkit::{arrival_order, arrival_with_replays, interleaved, GateFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

fn delivered(n: usize) -> Disposition {
    Disposition::Delivered {
        delivered: n,
        failed: 0,
    }
}

#[test]
fn in_order_passthrough_never_buffers() {
    init_tracing();
    let fixture = GateFixture::new();

    for seq in 0..=50 {
        assert_eq!(fixture.send("room", seq), delivered(1));
        assert_eq!(fixture.threshold("room"), Some(seq + 1));
        assert_eq!(fixture.pending("room"), None);
    }

    assert_eq!(fixture.delivered("room"), (0..=50).collect::<Vec<_>>());
    assert_eq!(fixture.gate.stats().buffered, 0);
}

#[test]
fn single_gap_filled_from_behind() {
    init_tracing();
    let fixture = GateFixture::new();

    assert_eq!(
        fixture.send("room", 1),
        Disposition::Buffered { waiting_for: 0 }
    );
    assert_eq!(fixture.threshold("room"), Some(0));
    assert_eq!(fixture.pending("room"), Some(vec![1]));
    assert!(fixture.delivered("room").is_empty());

    assert_eq!(fixture.send("room", 0), delivered(2));
    assert_eq!(fixture.delivered("room"), vec![0, 1]);
    assert_eq!(fixture.threshold("room"), Some(2));
    assert_eq!(fixture.pending("room"), None);

    assert_eq!(fixture.send("room", 2), delivered(1));
    assert_eq!(fixture.delivered("room"), vec![0, 1, 2]);
    assert_eq!(fixture.threshold("room"), Some(3));
    assert_eq!(fixture.pending("room"), None);
}

#[test]
fn wide_gap_filled_out_of_order() {
    init_tracing();
    let fixture = GateFixture::new();

    fixture.feed("room", &[0, 3]);
    assert_eq!(fixture.threshold("room"), Some(1));
    assert_eq!(fixture.pending("room"), Some(vec![3]));

    assert_eq!(fixture.send("room", 1), delivered(1));
    assert_eq!(fixture.threshold("room"), Some(2));
    assert_eq!(fixture.pending("room"), Some(vec![3]));

    assert_eq!(fixture.send("room", 2), delivered(2));
    assert_eq!(fixture.threshold("room"), Some(4));
    assert_eq!(fixture.pending("room"), None);
    assert_eq!(fixture.delivered("room"), vec![0, 1, 2, 3]);
}

#[test]
fn multiple_interleaved_gaps() {
    init_tracing();
    let fixture = GateFixture::new();

    fixture.feed("room", &[0, 2, 4, 5]);
    assert_eq!(fixture.threshold("room"), Some(1));
    assert_eq!(fixture.pending("room"), Some(vec![2, 4, 5]));
    assert_eq!(fixture.delivered("room"), vec![0]);

    assert_eq!(fixture.send("room", 1), delivered(2));
    assert_eq!(fixture.threshold("room"), Some(3));
    assert_eq!(fixture.pending("room"), Some(vec![4, 5]));

    assert_eq!(fixture.send("room", 3), delivered(3));
    assert_eq!(fixture.threshold("room"), Some(6));
    assert_eq!(fixture.pending("room"), None);
    assert_eq!(fixture.delivered("room"), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn principals_are_isolated() {
    init_tracing();
    let fixture = GateFixture::new();

    fixture.send("alice", 1);
    fixture.send("bob", 0);
    fixture.send("bob", 1);
    fixture.send("alice", 3);

    assert_eq!(fixture.threshold("alice"), Some(0));
    assert_eq!(fixture.pending("alice"), Some(vec![1, 3]));
    assert_eq!(fixture.threshold("bob"), Some(2));
    assert_eq!(fixture.pending("bob"), None);

    fixture.send("alice", 0);
    assert_eq!(fixture.delivered("alice"), vec![0, 1]);
    assert_eq!(fixture.delivered("bob"), vec![0, 1]);
    assert_eq!(fixture.threshold("bob"), Some(2));
}

#[test]
fn drain_after_gap_closed_is_a_no_op() {
    init_tracing();
    let fixture = GateFixture::new();

    fixture.feed("room", &[1, 0]);
    assert_eq!(fixture.pending("room"), None);

    // Replays of already-delivered stanzas change nothing.
    assert_eq!(fixture.send("room", 0), Disposition::Stale { threshold: 2 });
    assert_eq!(fixture.send("room", 1), Disposition::Stale { threshold: 2 });
    assert_eq!(fixture.delivered("room"), vec![0, 1]);

    assert_eq!(fixture.send("room", 2), delivered(1));
    assert_eq!(fixture.delivered("room"), vec![0, 1, 2]);
    assert_eq!(fixture.gate.stats().stale, 2);
}

#[test]
fn fresh_gap_recreates_inbox() {
    init_tracing();
    let fixture = GateFixture::new();

    fixture.feed("room", &[1, 0]);
    assert_eq!(fixture.pending("room"), None);

    fixture.send("room", 4);
    assert_eq!(fixture.pending("room"), Some(vec![4]));

    let snapshot = fixture
        .gate
        .snapshot(&stanza_gate::Principal::new("room"))
        .unwrap();
    assert_eq!(
        snapshot.health,
        LaneHealth::GapPending {
            waiting_for: 2,
            lowest_buffered: 4,
            buffered: 1,
        }
    );
    assert_eq!(snapshot.health.gap_width(), Some(2));
}

#[test]
fn duplicate_of_buffered_stanza_is_dropped() {
    init_tracing();
    let fixture = GateFixture::new();

    fixture.send("room", 2);
    assert_eq!(fixture.send("room", 2), Disposition::Duplicate);
    assert_eq!(fixture.pending("room"), Some(vec![2]));

    fixture.feed("room", &[0, 1]);
    assert_eq!(fixture.delivered("room"), vec![0, 1, 2]);
}

#[test]
fn bounded_inbox_still_accepts_threshold() {
    init_tracing();
    let fixture = GateFixture::with_config(GateConfig::default().with_max_pending(1));

    fixture.send("room", 2);
    assert_eq!(
        fixture.send("room", 1),
        Disposition::Overflow { waiting_for: 0 }
    );

    // 1 was dropped, so 0 releases only itself; 2 waits for a resend of 1.
    assert_eq!(fixture.send("room", 0), delivered(1));
    assert_eq!(fixture.pending("room"), Some(vec![2]));

    assert_eq!(fixture.send("room", 1), delivered(2));
    assert_eq!(fixture.delivered("room"), vec![0, 1, 2]);
}

proptest! {
    #[test]
    fn any_permutation_is_delivered_in_order(order in arrival_order(128)) {
        let fixture = GateFixture::new();
        fixture.feed("room", &order);

        let n = order.len() as u64;
        prop_assert_eq!(fixture.delivered("room"), (0..n).collect::<Vec<_>>());
        prop_assert_eq!(fixture.threshold("room"), Some(n));
        prop_assert_eq!(fixture.pending("room"), None);
    }

    #[test]
    fn replays_are_never_redelivered((n, schedule) in arrival_with_replays(64)) {
        let fixture = GateFixture::new();
        fixture.feed("room", &schedule);

        prop_assert_eq!(fixture.delivered("room"), (0..n).collect::<Vec<_>>());
        let stats = fixture.gate.stats();
        prop_assert_eq!(stats.delivered, n);
        prop_assert_eq!(stats.stale + stats.duplicates, schedule.len() as u64 - n);
    }

    #[test]
    fn interleaved_principals_each_in_order((n, schedule) in interleaved(4, 32)) {
        let fixture = GateFixture::new();
        let names = stanza_gate_testkit::principal_names(4);

        for (p, seq) in schedule {
            fixture.send(&names[p], seq);
        }

        for name in &names {
            prop_assert_eq!(fixture.delivered(name), (0..n).collect::<Vec<_>>());
        }
        prop_assert_eq!(fixture.gate.len(), 4);
    }
}
