//! Binary classification metrics over held-out predictions
//!
//! Positive class is 1. Every ratio whose denominator is zero resolves to
//! 0.0 instead of failing, so a split with no positive predictions still
//! yields a complete [`MetricSet`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confusion counts for the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    /// Predicted 1, actually 1
    pub true_positives: usize,
    /// Predicted 1, actually 0
    pub false_positives: usize,
    /// Predicted 0, actually 0
    pub true_negatives: usize,
    /// Predicted 0, actually 1
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// Tally predictions against ground truth.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] if the slices differ in length
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(Error::DataShape(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut counts = Self::default();
        for (&truth, &pred) in y_true.iter().zip(y_pred) {
            match (truth == 1, pred == 1) {
                (true, true) => counts.true_positives += 1,
                (false, true) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (true, false) => counts.false_negatives += 1,
            }
        }
        Ok(counts)
    }

    /// Number of samples tallied.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Fixed metric set recorded for every run; all values lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// TP / (TP + FP)
    pub precision: f64,
    /// TP / (TP + FN)
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
}

impl MetricSet {
    /// Metric names in recording order.
    pub const NAMES: [&'static str; 4] = ["accuracy", "precision", "recall", "f1"];

    /// Compute the metric set from labels and predictions.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] if the slices differ in length
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        Ok(Self::from_counts(&ConfusionCounts::from_predictions(
            y_true, y_pred,
        )?))
    }

    /// Compute the metric set from confusion counts.
    #[must_use]
    pub fn from_counts(counts: &ConfusionCounts) -> Self {
        let tp = counts.true_positives;
        Self {
            accuracy: ratio(tp + counts.true_negatives, counts.total()),
            precision: ratio(tp, tp + counts.false_positives),
            recall: ratio(tp, tp + counts.false_negatives),
            f1: ratio(2 * tp, 2 * tp + counts.false_positives + counts.false_negatives),
        }
    }

    /// Metric by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "accuracy" => Some(self.accuracy),
            "precision" => Some(self.precision),
            "recall" => Some(self.recall),
            "f1" => Some(self.f1),
            _ => None,
        }
    }

    /// `(name, value)` pairs in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Self::NAMES.into_iter().filter_map(|name| self.get(name).map(|v| (name, v)))
    }
}

impl fmt::Display for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_confusion_counts() {
        let counts = ConfusionCounts::from_predictions(&[1, 1, 0, 0, 1], &[1, 0, 0, 1, 1]).unwrap();
        assert_eq!(counts.true_positives, 2);
        assert_eq!(counts.false_negatives, 1);
        assert_eq!(counts.true_negatives, 1);
        assert_eq!(counts.false_positives, 1);
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn test_standard_definitions() {
        let m = MetricSet::from_predictions(&[1, 1, 0, 0, 1], &[1, 0, 0, 1, 1]).unwrap();
        assert!(close(m.accuracy, 0.6));
        assert!(close(m.precision, 2.0 / 3.0));
        assert!(close(m.recall, 2.0 / 3.0));
        assert!(close(m.f1, 2.0 / 3.0));
    }

    #[test]
    fn test_no_positive_predictions_resolve_to_zero() {
        let m = MetricSet::from_predictions(&[1, 0, 1], &[0, 0, 0]).unwrap();
        assert!(close(m.accuracy, 1.0 / 3.0));
        assert!(close(m.precision, 0.0));
        assert!(close(m.recall, 0.0));
        assert!(close(m.f1, 0.0));
    }

    #[test]
    fn test_all_negative_ground_truth() {
        let m = MetricSet::from_predictions(&[0, 0], &[0, 0]).unwrap();
        assert!(close(m.accuracy, 1.0));
        assert!(close(m.recall, 0.0));
    }

    #[test]
    fn test_empty_input() {
        let m = MetricSet::from_predictions(&[], &[]).unwrap();
        assert!(m.iter().all(|(_, v)| close(v, 0.0)));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            MetricSet::from_predictions(&[1], &[1, 0]),
            Err(Error::DataShape(_))
        ));
    }

    #[test]
    fn test_iter_order_and_json_keys() {
        let m = MetricSet::from_predictions(&[1, 0], &[1, 0]).unwrap();
        let names: Vec<_> = m.iter().map(|(n, _)| n).collect();
        assert_eq!(names, MetricSet::NAMES);

        let json = serde_json::to_value(m).unwrap();
        for name in MetricSet::NAMES {
            assert!(json.get(name).is_some());
        }
    }
}
