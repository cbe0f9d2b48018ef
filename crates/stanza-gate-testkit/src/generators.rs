//! Proptest generators for arrival orders.
//!
//! Every generator here yields a schedule that contains each sequence number
//! `0..n` at least once, so a correct gate must deliver exactly `0..n`.

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

use stanza_gate_core::{Principal, SeqNo};

/// Generate a principal name.
pub fn principal() -> impl Strategy<Value = Principal> {
    "[a-z][a-z0-9-]{0,15}".prop_map(Principal::from)
}

/// A shuffled permutation of `0..n`.
pub fn permutation(n: SeqNo) -> impl Strategy<Value = Vec<SeqNo>> {
    Just((0..n).collect::<Vec<_>>()).prop_shuffle()
}

/// A shuffled permutation of `0..n` for some `n` in `1..=max_n`.
pub fn arrival_order(max_n: SeqNo) -> impl Strategy<Value = Vec<SeqNo>> {
    (1..=max_n).prop_flat_map(permutation)
}

/// A shuffled schedule of `0..n` with some sequence numbers repeated,
/// modelling retransmissions arriving before and after the original.
pub fn arrival_with_replays(max_n: SeqNo) -> impl Strategy<Value = (SeqNo, Vec<SeqNo>)> {
    (1..=max_n)
        .prop_flat_map(|n| {
            let extra = (n / 2).max(1) as usize;
            (Just(n), prop::collection::vec(0..n, 0..=extra))
        })
        .prop_flat_map(|(n, replays)| {
            let mut schedule: Vec<SeqNo> = (0..n).collect();
            schedule.extend(replays);
            (Just(n), Just(schedule).prop_shuffle())
        })
}

/// Several principals, each with its own permutation of `0..n`, merged into
/// one arrival schedule of `(principal index, seq)`.
pub fn interleaved(
    principals: usize,
    max_n: SeqNo,
) -> impl Strategy<Value = (SeqNo, Vec<(usize, SeqNo)>)> {
    (1..=max_n).prop_flat_map(move |n| {
        let schedule: Vec<(usize, SeqNo)> = (0..principals)
            .flat_map(|p| (0..n).map(move |seq| (p, seq)))
            .collect();
        (Just(n), Just(schedule).prop_shuffle())
    })
}

/// A permutation of `0..n` drawn from `rng`, for tests outside proptest.
pub fn shuffled<R: Rng + ?Sized>(n: SeqNo, rng: &mut R) -> Vec<SeqNo> {
    let mut seqs: Vec<SeqNo> = (0..n).collect();
    seqs.shuffle(rng);
    seqs
}

/// Split `seqs` round-robin into `parts` chunks, one per feeding thread.
pub fn deal(seqs: &[SeqNo], parts: usize) -> Vec<Vec<SeqNo>> {
    let parts = parts.max(1);
    let mut hands = vec![Vec::new(); parts];
    for (i, &seq) in seqs.iter().enumerate() {
        hands[i % parts].push(seq);
    }
    hands
}
