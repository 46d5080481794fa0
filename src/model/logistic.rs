//! Logistic regression (`lr`)
//!
//! Minimizes mean log-loss plus an L2 penalty `||w||² / (2·C·n)` by
//! full-batch gradient descent on standardized features. Zero-initialized,
//! so fitting is deterministic without a seed.

use super::registry::{parse_params, ModelConfig, ModelKind};
use super::scaler::Standardizer;
use super::{check_fit_input, check_predict_input, sigmoid, Classifier, Predict};
use crate::{Error, Result};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hyperparameters for [`LogisticRegression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogisticParams {
    /// Inverse regularization strength; smaller is stronger.
    #[serde(rename = "C")]
    pub c: f64,
    /// Maximum gradient steps.
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this.
    pub tol: f64,
    /// Gradient descent step size.
    pub learning_rate: f64,
    /// Learn an unpenalized bias term.
    pub fit_intercept: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            learning_rate: 0.1,
            fit_intercept: true,
        }
    }
}

/// Unfitted logistic regression.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    params: LogisticParams,
}

impl LogisticRegression {
    /// Build from validated parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for non-positive `C`,
    /// `learning_rate` or `max_iter`, or a negative `tol`
    pub fn new(params: LogisticParams) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            model: ModelKind::LogisticRegression.identifier().to_string(),
            reason: reason.to_string(),
        };
        if params.c.is_nan() || params.c <= 0.0 {
            return Err(invalid("C must be positive"));
        }
        if params.learning_rate.is_nan() || params.learning_rate <= 0.0 {
            return Err(invalid("learning_rate must be positive"));
        }
        if params.max_iter == 0 {
            return Err(invalid("max_iter must be at least 1"));
        }
        if params.tol.is_nan() || params.tol < 0.0 {
            return Err(invalid("tol must be non-negative"));
        }
        Ok(Self { params })
    }

    /// Build from a configuration mapping merged over the defaults.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for unknown names, bad types or
    /// out-of-range values
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(parse_params(ModelKind::LogisticRegression, config)?)
    }

    /// Effective hyperparameters.
    #[must_use]
    pub const fn params(&self) -> &LogisticParams {
        &self.params
    }
}

impl Classifier for LogisticRegression {
    type Fitted = FittedLogistic;

    #[allow(clippy::cast_precision_loss)]
    fn fit(&self, features: ArrayView2<'_, f64>, labels: &[u8]) -> Result<FittedLogistic> {
        check_fit_input(features, labels)?;

        let scaler = Standardizer::fit(features);
        let x = scaler.transform(features);
        let y: Array1<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let n = x.nrows() as f64;
        let penalty = 1.0 / (self.params.c * n);

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut intercept = 0.0;
        let mut n_iter = 0;

        for _ in 0..self.params.max_iter {
            n_iter += 1;
            let residual = (x.dot(&weights) + intercept).mapv(sigmoid) - &y;

            let grad_w = x.t().dot(&residual) / n + &weights * penalty;
            let grad_b = if self.params.fit_intercept {
                residual.sum() / n
            } else {
                0.0
            };

            weights.scaled_add(-self.params.learning_rate, &grad_w);
            intercept -= self.params.learning_rate * grad_b;

            let largest = grad_w
                .iter()
                .fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            if largest < self.params.tol {
                break;
            }
        }

        debug!(n_iter, "Logistic regression converged");
        Ok(FittedLogistic {
            scaler,
            coefficients: weights,
            intercept,
            n_iter,
        })
    }
}

/// Learned logistic regression state (coefficients on standardized inputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLogistic {
    scaler: Standardizer,
    coefficients: Array1<f64>,
    intercept: f64,
    n_iter: usize,
}

impl FittedLogistic {
    /// Coefficients in standardized feature space.
    #[must_use]
    pub const fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Learned bias.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Gradient steps taken.
    #[must_use]
    pub const fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Training width.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Probability of the positive class per row.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] on a width mismatch
    pub fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_predict_input(features, self.n_features())?;
        let x = self.scaler.transform(features);
        Ok((x.dot(&self.coefficients) + self.intercept).mapv(sigmoid))
    }
}

impl Predict for FittedLogistic {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.iter().map(|&p| u8::from(p > 0.5)).collect())
    }
}
