//! Trainer/Evaluator: deterministic split, fit, held-out metrics
//!
//! ```text
//! Dataset ──split(seed)──> train rows ──fit──> TrainedModel
//!                      └─> test rows ───predict──> MetricSet
//! ```
//!
//! The split is a ChaCha8 permutation seeded by [`SplitConfig::seed`]; the
//! same dataset and seed always yield the same partition.

mod metrics;
pub mod persist;

pub use metrics::{ConfusionCounts, MetricSet};

use crate::dataset::Dataset;
use crate::model::{ModelSpec, Predict, TrainedModel};
use crate::{Error, Result};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default held-out fraction.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default split seed.
pub const DEFAULT_SEED: u64 = 121_212;

/// How to partition the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation, in (0, 1).
    pub test_fraction: f64,
    /// Permutation seed.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

/// Train/test partition of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Feature column names, matrix column order.
    pub feature_names: Vec<String>,
    /// Training rows (one row per sample).
    pub train_features: Array2<f64>,
    /// Held-out rows.
    pub test_features: Array2<f64>,
    /// Training labels.
    pub train_labels: Vec<u8>,
    /// Held-out labels.
    pub test_labels: Vec<u8>,
    /// Original row index of every training sample.
    pub train_rows: Vec<usize>,
    /// Original row index of every held-out sample.
    pub test_rows: Vec<usize>,
}

/// Extract the feature matrix and labels, then partition them.
///
/// Every column except `label_field` is a feature.
///
/// # Errors
/// Returns [`Error::DataShape`] if the label column is absent or not 0/1,
/// no feature columns remain, a feature is non-numeric or null, or the
/// fraction leaves either side empty
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn split(dataset: &Dataset, label_field: &str, test_fraction: f64, seed: u64) -> Result<Split> {
    if !dataset.has_field(label_field) {
        return Err(Error::DataShape(format!(
            "label column `{label_field}` not found in dataset"
        )));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::DataShape(format!(
            "test fraction {test_fraction} must lie strictly between 0 and 1"
        )));
    }

    let feature_names: Vec<String> = dataset
        .field_names()
        .into_iter()
        .filter(|name| *name != label_field)
        .map(str::to_string)
        .collect();
    if feature_names.is_empty() {
        return Err(Error::DataShape(
            "feature set is empty after removing the label".to_string(),
        ));
    }

    let labels = label_values(dataset, label_field)?;
    let features = feature_matrix(dataset, &feature_names)?;

    let n = labels.len();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::DataShape(format!(
            "cannot hold out {n_test} of {n} rows and still train"
        )));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let (test_rows, train_rows) = permutation.split_at(n_test);

    Ok(Split {
        train_features: features.select(Axis(0), train_rows),
        test_features: features.select(Axis(0), test_rows),
        train_labels: train_rows.iter().map(|&r| labels[r]).collect(),
        test_labels: test_rows.iter().map(|&r| labels[r]).collect(),
        train_rows: train_rows.to_vec(),
        test_rows: test_rows.to_vec(),
        feature_names,
    })
}

fn label_values(dataset: &Dataset, label_field: &str) -> Result<Vec<u8>> {
    dataset
        .column_f64(label_field)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v == 0.0 => Ok(0),
            Some(v) if v == 1.0 => Ok(1),
            Some(v) => Err(Error::DataShape(format!(
                "label `{label_field}` has non-binary value {v} at row {row}"
            ))),
            None => Err(Error::DataShape(format!(
                "label `{label_field}` is null at row {row}"
            ))),
        })
        .collect()
}

fn feature_matrix(dataset: &Dataset, feature_names: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((dataset.num_rows(), feature_names.len()));
    for (j, name) in feature_names.iter().enumerate() {
        let values = dataset.column_f64(name)?;
        for (i, value) in values.into_iter().enumerate() {
            let value = value.ok_or_else(|| {
                Error::DataShape(format!("feature `{name}` is null at row {i}"))
            })?;
            if !value.is_finite() {
                return Err(Error::DataShape(format!(
                    "feature `{name}` is {value} at row {i}"
                )));
            }
            matrix[[i, j]] = value;
        }
    }
    Ok(matrix)
}

/// Split, fit the specified model, and score it on the held-out rows.
///
/// # Errors
/// Returns [`Error::DataShape`] for an unusable dataset (see [`split`]) and
/// [`Error::InvalidParameter`] if the model rejects its configuration
pub fn train_and_evaluate(
    dataset: &Dataset,
    label_field: &str,
    model_spec: &ModelSpec,
    split_config: &SplitConfig,
) -> Result<(TrainedModel, MetricSet)> {
    let split = split(dataset, label_field, split_config.test_fraction, split_config.seed)?;
    info!(
        train = split.train_labels.len(),
        test = split.test_labels.len(),
        features = split.feature_names.len(),
        "Split dataset"
    );

    let estimator = model_spec.build()?;
    info!(model = %model_spec.kind(), "Training model");
    let model = estimator.fit(split.train_features.view(), &split.train_labels)?;

    let predicted = model.predict(split.test_features.view())?;
    let metrics = MetricSet::from_predictions(&split.test_labels, &predicted)?;
    info!(%metrics, "Evaluated on held-out split");

    Ok((model, metrics))
}
