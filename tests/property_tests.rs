//! Property-based tests for trueno-mlops
//!
//! - Labeling, splitting and scoring invariants
//! - Run with `ProptestConfig::with_cases(100)`

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use proptest::prelude::*;
use std::sync::Arc;
use trueno_mlops::compare::{compute_deltas, VersionRecord};
use trueno_mlops::dataset::Dataset;
use trueno_mlops::train::{split, MetricSet};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Dataset with one continuous `score` column.
fn arb_scores(max_rows: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-100.0f64..100.0, 1..max_rows)
}

/// Labeled dataset of `n` rows with two features.
#[allow(clippy::cast_precision_loss)]
fn labeled(labels: &[u8]) -> Dataset {
    let n = labels.len();
    let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let b: Vec<f64> = (0..n).map(|i| (i % 7) as f64 * 0.5).collect();
    let y: Vec<i64> = labels.iter().map(|&l| i64::from(l)).collect();
    Dataset::from_columns(vec![
        ("a", Arc::new(Float64Array::from(a)) as ArrayRef),
        ("b", Arc::new(Float64Array::from(b)) as ArrayRef),
        ("y", Arc::new(Int64Array::from(y)) as ArrayRef),
    ])
    .unwrap()
}

fn arb_labels(min: usize, max: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..=1, min..max)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Dataset Preparer Properties
    // ========================================================================

    /// Property: label is 1 exactly when the source value exceeds the threshold
    #[test]
    fn prop_binary_target_matches_threshold(
        scores in arb_scores(60),
        threshold in -100.0f64..100.0
    ) {
        let data = Dataset::from_columns(vec![
            ("score", Arc::new(Float64Array::from(scores.clone())) as ArrayRef),
        ]).unwrap();
        let labeled = data.create_binary_target("score", threshold).unwrap();
        let labels = labeled.column_f64("score_binary").unwrap();

        prop_assert_eq!(labels.len(), scores.len());
        for (score, label) in scores.iter().zip(labels) {
            let expected = if *score > threshold { 1.0 } else { 0.0 };
            prop_assert_eq!(label, Some(expected));
        }
    }

    /// Property: removing no fields is a no-op
    #[test]
    fn prop_remove_nothing_is_identity(scores in arb_scores(30)) {
        let data = Dataset::from_columns(vec![
            ("score", Arc::new(Float64Array::from(scores)) as ArrayRef),
        ]).unwrap();
        let empty: [&str; 0] = [];
        prop_assert_eq!(data.remove_fields(&empty).unwrap(), data);
    }

    // ========================================================================
    // Split Properties
    // ========================================================================

    /// Property: same seed, same partition; every row lands on exactly one side
    #[test]
    fn prop_split_deterministic_and_complete(
        labels in arb_labels(5, 80),
        seed in any::<u64>()
    ) {
        let data = labeled(&labels);
        let first = split(&data, "y", 0.2, seed).unwrap();
        let second = split(&data, "y", 0.2, seed).unwrap();
        prop_assert_eq!(&first, &second);

        let mut rows: Vec<usize> = first.train_rows.iter().chain(&first.test_rows).copied().collect();
        rows.sort_unstable();
        prop_assert_eq!(rows, (0..labels.len()).collect::<Vec<_>>());
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let expected_test = (0.2 * labels.len() as f64).ceil() as usize;
        prop_assert_eq!(first.test_rows.len(), expected_test);
    }

    /// Property: distinct seeds give distinct partitions on non-trivial data
    #[test]
    fn prop_split_seed_sensitive(
        labels in arb_labels(40, 80),
        seed in 0u64..u64::MAX
    ) {
        let data = labeled(&labels);
        let a = split(&data, "y", 0.2, seed).unwrap();
        let b = split(&data, "y", 0.2, seed + 1).unwrap();
        prop_assert_ne!(a.test_rows, b.test_rows);
    }

    // ========================================================================
    // Metric Properties
    // ========================================================================

    /// Property: every metric lies in [0, 1]
    #[test]
    fn prop_metrics_bounded(pairs in proptest::collection::vec((0u8..=1, 0u8..=1), 0..100)) {
        let (truth, predicted): (Vec<u8>, Vec<u8>) = pairs.into_iter().unzip();
        let metrics = MetricSet::from_predictions(&truth, &predicted).unwrap();
        for (_, value) in metrics.iter() {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }

    /// Property: predicting all zeros gives zero precision, recall and f1
    #[test]
    fn prop_no_positive_predictions_score_zero(truth in arb_labels(1, 50)) {
        let predicted = vec![0u8; truth.len()];
        let metrics = MetricSet::from_predictions(&truth, &predicted).unwrap();
        prop_assert_eq!(metrics.precision, 0.0);
        prop_assert_eq!(metrics.recall, 0.0);
        prop_assert_eq!(metrics.f1, 0.0);
    }

    // ========================================================================
    // Comparator Properties
    // ========================================================================

    /// Property: deltas telescope back to the last value
    #[test]
    fn prop_deltas_telescope(accuracies in proptest::collection::vec(0.0f64..1.0, 1..20)) {
        let records: Vec<VersionRecord> = accuracies
            .iter()
            .enumerate()
            .map(|(i, &a)| VersionRecord {
                version: (i + 1).to_string(),
                accuracy: Some(a),
                ..VersionRecord::default()
            })
            .collect();
        let table = compute_deltas(&records);
        let total: f64 = table.deltas().unwrap().iter().filter_map(|d| d.accuracy).sum();
        let expected = accuracies[accuracies.len() - 1] - accuracies[0];
        prop_assert!((total - expected).abs() < 1e-9);
    }
}
