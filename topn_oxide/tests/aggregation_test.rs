//! Integration tests for sketch aggregation and telemetry
//!
//! Property-based checks of merge commutativity and of the telemetry
//! invariants: frequencies summing to the global total, ordered probability
//! bounds, and coverage staying inside (0, 1].

use proptest::prelude::*;
use std::collections::HashMap;
use topn_oxide::sketch::{aggregate_summaries, StreamSummary};

fn sketch_from(capacity: usize, items: &[u32]) -> StreamSummary<u32> {
    let mut sketch = StreamSummary::new(capacity).unwrap();
    for &item in items {
        sketch.insert(item);
    }
    sketch
}

#[test]
fn test_merged_counts_are_worker_sums() {
    let a = sketch_from(8, &[1, 1, 2, 3]);
    let b = sketch_from(8, &[1, 2, 2, 4]);
    let c = sketch_from(8, &[5, 5, 5]);

    let (merged, telemetry) = aggregate_summaries(&[a, b, c], 24, 3).unwrap();
    assert_eq!(merged.count(&1), Some(3));
    assert_eq!(merged.count(&2), Some(3));
    assert_eq!(merged.count(&3), Some(1));
    assert_eq!(merged.count(&4), Some(1));
    assert_eq!(merged.count(&5), Some(3));
    assert_eq!(merged.total_count(), 11);
    assert_eq!(telemetry.total, 11);

    // Item 5 is covered only by the third worker (total 3 of 11).
    let stats = telemetry.item_stats.iter().find(|s| s.item == 5).unwrap();
    assert!((stats.omega - 3.0 / 11.0).abs() < 1e-12);
    assert_eq!(telemetry.reporters[&5].iter().copied().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_overestimations_accumulate_across_workers() {
    // Both workers evicted before tracking item 9, so both contribute
    // overestimation to the merged element.
    let a = sketch_from(2, &[1, 2, 9, 9]);
    let b = sketch_from(2, &[3, 4, 9]);
    assert!(a.overestimation(&9) > 0);
    assert!(b.overestimation(&9) > 0);

    let (merged, _) = aggregate_summaries(&[a.clone(), b.clone()], 4, 2).unwrap();
    assert_eq!(
        merged.overestimation(&9),
        a.overestimation(&9) + b.overestimation(&9)
    );
    assert_eq!(
        merged.count(&9),
        Some(a.count(&9).unwrap() + b.count(&9).unwrap())
    );
}

proptest! {
    /// Invariant 6: aggregation does not depend on worker order.
    #[test]
    fn prop_aggregation_commutes(
        stream_a in prop::collection::vec(0u32..15, 0..120),
        stream_b in prop::collection::vec(0u32..15, 0..120),
        stream_c in prop::collection::vec(0u32..15, 0..120),
        capacity in 2usize..10,
        n in 1usize..8
    ) {
        let a = sketch_from(capacity, &stream_a);
        let b = sketch_from(capacity, &stream_b);
        let c = sketch_from(capacity, &stream_c);

        let (merged_fwd, tel_fwd) =
            aggregate_summaries(&[a.clone(), b.clone(), c.clone()], capacity * 3, n).unwrap();
        let (merged_rev, tel_rev) =
            aggregate_summaries(&[c, b, a], capacity * 3, n).unwrap();

        let mut fwd: Vec<_> = merged_fwd.iter().map(|(i, c, o)| (*i, c, o)).collect();
        let mut rev: Vec<_> = merged_rev.iter().map(|(i, c, o)| (*i, c, o)).collect();
        fwd.sort_unstable();
        rev.sort_unstable();
        prop_assert_eq!(fwd, rev);

        prop_assert_eq!(tel_fwd.total, tel_rev.total);
        prop_assert_eq!(tel_fwd.omega_min, tel_rev.omega_min);
        prop_assert_eq!(tel_fwd.tau_sp, tel_rev.tau_sp);
        let fwd_top: Vec<_> = tel_fwd.top_n.iter().map(|s| s.item).collect();
        let rev_top: Vec<_> = tel_rev.top_n.iter().map(|s| s.item).collect();
        prop_assert_eq!(fwd_top, rev_top);
    }

    /// Invariant 8: telemetry consistency for arbitrary worker streams.
    #[test]
    fn prop_telemetry_consistency(
        streams in prop::collection::vec(
            prop::collection::vec(0u32..20, 0..100),
            1..5
        ),
        capacity in 2usize..10,
        n in 1usize..6
    ) {
        let summaries: Vec<StreamSummary<u32>> = streams
            .iter()
            .map(|stream| sketch_from(capacity, stream))
            .collect();
        let union_bound = capacity * summaries.len();
        let (merged, telemetry) =
            aggregate_summaries(&summaries, union_bound, n).unwrap();

        let worker_total: u64 = summaries.iter().map(StreamSummary::total_count).sum();
        prop_assert_eq!(telemetry.total, worker_total);
        prop_assert_eq!(merged.total_count(), worker_total);

        let frequency_sum: u64 = telemetry.item_stats.iter().map(|s| s.frequency).sum();
        prop_assert_eq!(frequency_sum, worker_total);

        for stats in &telemetry.item_stats {
            prop_assert!(stats.p_floor >= 0.0 && stats.p_ceil <= 1.0);
            prop_assert!(stats.p_floor <= stats.p_hat);
            prop_assert!(stats.p_hat <= stats.p_ceil);
            prop_assert!(stats.omega > 0.0 && stats.omega <= 1.0 + 1e-12);
        }

        prop_assert!(telemetry.top_n.len() <= n);
        prop_assert!(telemetry.candidates.len() >= telemetry.top_n.len());
        prop_assert!((0.0..=1.0).contains(&telemetry.omega_min));
        prop_assert!((0.0..=1.0).contains(&telemetry.tau_sp));

        // The merged sketch agrees with the telemetry frequencies.
        for stats in &telemetry.item_stats {
            prop_assert_eq!(merged.count(&stats.item), Some(stats.frequency));
        }
    }
}
