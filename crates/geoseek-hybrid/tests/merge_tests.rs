use proptest::prelude::*;
use std::collections::BTreeMap;

use geoseek_core::{DatasetId, ErrorKind};
use geoseek_hybrid::HybridMerger;
use geoseek_spatial::SpatialMatches;

fn id(s: &str) -> DatasetId { DatasetId::from(s) }

fn spatial(ids: &[&str]) -> SpatialMatches {
    ids.iter().map(|s| (id(s), 1.0)).collect()
}

fn ids(candidates: &[geoseek_core::ScoredCandidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.dataset_id.as_str()).collect()
}

#[test]
fn spatial_set_is_a_hard_filter() {
    let merged = HybridMerger::default().merge(
        &spatial(&["ds-12", "ds-45"]),
        &[(id("ds-45"), 0.9), (id("ds-99"), 0.7)],
        true,
        5,
    );
    assert_eq!(ids(&merged), vec!["ds-45", "ds-12"]);
    assert!((merged[0].combined_score - 0.95).abs() < 1e-6);
    assert!((merged[1].combined_score - 0.5).abs() < 1e-6);
    assert_eq!(merged[1].semantic_score, 0.0);
}

#[test]
fn without_spatial_the_semantic_order_is_kept() {
    let semantic = vec![(id("b"), 0.8), (id("a"), 0.8), (id("c"), -0.2)];
    let merged = HybridMerger::new(0.3).unwrap().merge(&BTreeMap::new(), &semantic, false, 10);
    assert_eq!(ids(&merged), vec!["a", "b", "c"]);
    assert!((merged[2].combined_score + 0.2).abs() < 1e-6, "raw similarity is kept");
}

#[test]
fn both_sets_win_exact_ties() {
    // With alpha = 1 the semantic score has no weight, so every candidate ties.
    let merged = HybridMerger::new(1.0).unwrap().merge(&spatial(&["a", "b", "c"]), &[(id("c"), 0.4)], true, 10);
    assert_eq!(ids(&merged), vec!["c", "a", "b"]);
}

#[test]
fn duplicate_semantic_ids_keep_first_score() {
    let merged = HybridMerger::default().merge(&BTreeMap::new(), &[(id("a"), 0.9), (id("a"), 0.1)], false, 10);
    assert_eq!(merged.len(), 1);
    assert!((merged[0].semantic_score - 0.9).abs() < 1e-6);
}

#[test]
fn alpha_outside_unit_interval_is_rejected() {
    for alpha in [-0.1, 1.01, f32::NAN] {
        assert_eq!(HybridMerger::new(alpha).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
}

fn inputs() -> impl Strategy<Value = (Vec<u8>, Vec<(u8, f32)>, f32, usize)> {
    (
        prop::collection::vec(0u8..40, 0..20),
        prop::collection::vec((0u8..40, -1.0f32..=1.0), 0..20),
        0.0f32..=1.0,
        1usize..15,
    )
}

proptest! {
    #[test]
    fn merge_is_bounded_sorted_and_closed((sp, sem, alpha, k) in inputs()) {
        let spatial: SpatialMatches = sp.iter().map(|n| (DatasetId::new(format!("d{n:02}")), 1.0)).collect();
        let semantic: Vec<(DatasetId, f32)> = sem.iter().map(|(n, s)| (DatasetId::new(format!("d{n:02}")), *s)).collect();
        let merger = HybridMerger::new(alpha).unwrap();

        for available in [true, false] {
            let merged = merger.merge(&spatial, &semantic, available, k);
            prop_assert!(merged.len() <= k);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].combined_score >= pair[1].combined_score);
            }
            for c in &merged {
                if available {
                    prop_assert!(spatial.contains_key(&c.dataset_id));
                    prop_assert!((0.0..=1.0).contains(&c.combined_score));
                } else {
                    prop_assert!(semantic.iter().any(|(id, _)| id == &c.dataset_id));
                }
            }
            prop_assert_eq!(&merged, &merger.merge(&spatial, &semantic, available, k));
        }
    }
}
