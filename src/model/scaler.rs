//! Per-column standardization shared by the gradient-trained families

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance column transform learned from training data.
///
/// Constant columns keep a scale of 1 so they map to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    /// Learn column means and standard deviations.
    #[must_use]
    pub fn fit(features: ArrayView2<'_, f64>) -> Self {
        let n_features = features.ncols();
        let mean = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Self { mean, scale }
    }

    /// Apply the learned transform.
    #[must_use]
    pub fn transform(&self, features: ArrayView2<'_, f64>) -> Array2<f64> {
        (&features - &self.mean) / &self.scale
    }

    /// Number of columns this transform expects.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}
