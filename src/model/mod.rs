//! Classifier families and the capability traits they share
//!
//! ## Overview
//!
//! ```text
//! ModelSpec (id + config) ──build──> Estimator ──fit──> TrainedModel ──predict──> labels
//!                                      │                    │
//!                                      ├ RandomForest       ├ FittedForest
//!                                      ├ LogisticRegression ├ FittedLogistic
//!                                      └ MlpClassifier      └ FittedMlp
//! ```
//!
//! Every family implements [`Classifier`] (fit) and its fitted state
//! implements [`Predict`]. [`Estimator`] and [`TrainedModel`] are the tagged
//! unions the trainer works with, so the only dispatch on a model name is the
//! registry lookup in [`ModelSpec::resolve`].

mod forest;
mod logistic;
mod mlp;
mod registry;
mod scaler;

pub use forest::{DecisionTree, FeatureRule, FittedForest, ForestParams, MaxFeatures, RandomForest};
pub use logistic::{FittedLogistic, LogisticParams, LogisticRegression};
pub use mlp::{Activation, FittedMlp, MlpClassifier, MlpParams};
pub use registry::{resolve, ModelConfig, ModelKind, ModelSpec};
pub use scaler::Standardizer;

use crate::{Error, Result};
use ndarray::ArrayView2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Capability to learn from a labeled feature matrix.
pub trait Classifier {
    /// Learned state produced by a successful fit.
    type Fitted: Predict;

    /// Fit on `features` (one row per sample) and binary `labels`.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] if the inputs are empty, disagree in
    /// length, or contain labels outside {0, 1}
    fn fit(&self, features: ArrayView2<'_, f64>, labels: &[u8]) -> Result<Self::Fitted>;
}

/// Capability to label unseen samples.
pub trait Predict {
    /// Predict a 0/1 label per row.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] if the column count differs from training
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>>;
}

/// An unfitted classifier of any registered family.
#[derive(Debug, Clone, PartialEq)]
pub enum Estimator {
    /// Ensemble of decision trees (`rf`)
    RandomForest(RandomForest),
    /// L2-regularised logistic regression (`lr`)
    LogisticRegression(LogisticRegression),
    /// Feed-forward network (`mlp`)
    Mlp(MlpClassifier),
}

impl Estimator {
    /// Family of this estimator.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::Mlp(_) => ModelKind::Mlp,
        }
    }

    /// Effective parameters (defaults merged with the supplied config).
    #[must_use]
    pub fn params(&self) -> serde_json::Value {
        let value = match self {
            Self::RandomForest(m) => serde_json::to_value(m.params()),
            Self::LogisticRegression(m) => serde_json::to_value(m.params()),
            Self::Mlp(m) => serde_json::to_value(m.params()),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Fit the wrapped classifier.
    ///
    /// # Errors
    /// Propagates the family's fit error
    pub fn fit(&self, features: ArrayView2<'_, f64>, labels: &[u8]) -> Result<TrainedModel> {
        Ok(match self {
            Self::RandomForest(m) => TrainedModel::RandomForest(m.fit(features, labels)?),
            Self::LogisticRegression(m) => {
                TrainedModel::LogisticRegression(m.fit(features, labels)?)
            }
            Self::Mlp(m) => TrainedModel::Mlp(m.fit(features, labels)?),
        })
    }
}

/// Learned parameters of any registered family. Immutable after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "state", rename_all = "snake_case")]
pub enum TrainedModel {
    /// Fitted random forest
    RandomForest(FittedForest),
    /// Fitted logistic regression
    LogisticRegression(FittedLogistic),
    /// Fitted multilayer perceptron
    Mlp(FittedMlp),
}

impl TrainedModel {
    /// Family of this model.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::Mlp(_) => ModelKind::Mlp,
        }
    }

    /// Number of feature columns the model was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            Self::RandomForest(m) => m.n_features(),
            Self::LogisticRegression(m) => m.n_features(),
            Self::Mlp(m) => m.n_features(),
        }
    }
}

impl Predict for TrainedModel {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        match self {
            Self::RandomForest(m) => m.predict(features),
            Self::LogisticRegression(m) => m.predict(features),
            Self::Mlp(m) => m.predict(features),
        }
    }
}

/// Validate fit inputs shared by every family.
pub(crate) fn check_fit_input(features: ArrayView2<'_, f64>, labels: &[u8]) -> Result<()> {
    if features.nrows() == 0 {
        return Err(Error::DataShape("cannot fit on zero samples".to_string()));
    }
    if features.ncols() == 0 {
        return Err(Error::DataShape("cannot fit on zero features".to_string()));
    }
    if features.nrows() != labels.len() {
        return Err(Error::DataShape(format!(
            "feature rows ({}) and labels ({}) differ in length",
            features.nrows(),
            labels.len()
        )));
    }
    if let Some(bad) = labels.iter().find(|&&l| l > 1) {
        return Err(Error::DataShape(format!("label {bad} is not binary")));
    }
    if let Some(((row, col), value)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(Error::DataShape(format!(
            "feature value {value} at row {row}, column {col} is not finite"
        )));
    }
    Ok(())
}

/// Validate predict inputs against the training width.
pub(crate) fn check_predict_input(features: ArrayView2<'_, f64>, n_features: usize) -> Result<()> {
    if features.ncols() == n_features {
        Ok(())
    } else {
        Err(Error::DataShape(format!(
            "model expects {n_features} features, got {}",
            features.ncols()
        )))
    }
}

/// Seeded RNG; `None` draws a seed from OS entropy.
pub(crate) fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64)
}

/// Numerically stable logistic function.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
