//! Multilayer perceptron (`mlp`)
//!
//! Fully connected hidden layers feeding one sigmoid output unit, trained
//! with Adam on mini-batches of binary cross-entropy plus an L2 penalty.
//! Inputs are standardized with statistics learned during fit.

use super::registry::{parse_params, ModelConfig, ModelKind};
use super::scaler::Standardizer;
use super::{check_fit_input, check_predict_input, seeded_rng, sigmoid, Classifier, Predict};
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Adam bias-correction terms `1 - β^t`, tracked as running powers of β.
#[derive(Debug, Clone, Copy)]
struct BiasCorrection {
    beta1_power: f64,
    beta2_power: f64,
}

impl Default for BiasCorrection {
    fn default() -> Self {
        Self {
            beta1_power: 1.0,
            beta2_power: 1.0,
        }
    }
}

impl BiasCorrection {
    /// Move to the next step and return its `(1 - β1^t, 1 - β2^t)`.
    fn advance(&mut self) -> (f64, f64) {
        self.beta1_power *= BETA1;
        self.beta2_power *= BETA2;
        (1.0 - self.beta1_power, 1.0 - self.beta2_power)
    }
}
const PROBA_CLIP: f64 = 1e-15;

/// Hidden-layer nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// max(0, x)
    Relu,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic sigmoid
    Logistic,
}

impl Activation {
    fn apply(self, z: &mut Array2<f64>) {
        match self {
            Self::Relu => z.mapv_inplace(|v| v.max(0.0)),
            Self::Tanh => z.mapv_inplace(f64::tanh),
            Self::Logistic => z.mapv_inplace(sigmoid),
        }
    }

    /// Derivative expressed through the activation output.
    fn derivative(self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Self::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Self::Tanh => a.mapv(|v| 1.0 - v * v),
            Self::Logistic => a.mapv(|v| v * (1.0 - v)),
        }
    }
}

/// Hyperparameters for [`MlpClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MlpParams {
    /// Width of each hidden layer, input side first.
    pub hidden_layer_sizes: Vec<usize>,
    /// Hidden-layer nonlinearity.
    pub activation: Activation,
    /// L2 penalty strength.
    pub alpha: f64,
    /// Mini-batch size (capped at the sample count).
    pub batch_size: usize,
    /// Adam step size.
    pub learning_rate_init: f64,
    /// Maximum epochs.
    pub max_iter: usize,
    /// Minimum loss improvement that resets the patience counter.
    pub tol: f64,
    /// Epochs without improvement before stopping.
    pub n_iter_no_change: usize,
    /// Reshuffle samples every epoch.
    pub shuffle: bool,
    /// Seed for weight init and shuffling; `None` seeds from OS entropy.
    pub random_state: Option<u64>,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: Activation::Relu,
            alpha: 1e-4,
            batch_size: 200,
            learning_rate_init: 1e-3,
            max_iter: 200,
            tol: 1e-4,
            n_iter_no_change: 10,
            shuffle: true,
            random_state: None,
        }
    }
}

/// Unfitted multilayer perceptron.
#[derive(Debug, Clone, PartialEq)]
pub struct MlpClassifier {
    params: MlpParams,
}

impl MlpClassifier {
    /// Build from validated parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for a zero-width layer, zero
    /// `batch_size`/`max_iter`/`n_iter_no_change`, a non-positive learning
    /// rate, or a negative `alpha`/`tol`
    pub fn new(params: MlpParams) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            model: ModelKind::Mlp.identifier().to_string(),
            reason: reason.to_string(),
        };
        if params.hidden_layer_sizes.contains(&0) {
            return Err(invalid("hidden_layer_sizes entries must be at least 1"));
        }
        if params.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if params.max_iter == 0 {
            return Err(invalid("max_iter must be at least 1"));
        }
        if params.n_iter_no_change == 0 {
            return Err(invalid("n_iter_no_change must be at least 1"));
        }
        if params.learning_rate_init.is_nan() || params.learning_rate_init <= 0.0 {
            return Err(invalid("learning_rate_init must be positive"));
        }
        if params.alpha.is_nan() || params.alpha < 0.0 {
            return Err(invalid("alpha must be non-negative"));
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
        Self::new(parse_params(ModelKind::Mlp, config)?)
    }

    /// Effective hyperparameters.
    #[must_use]
    pub const fn params(&self) -> &MlpParams {
        &self.params
    }
}

/// Dense layer: `out = act(in · weights + bias)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Layer {
    /// Glorot-uniform initialization.
    #[allow(clippy::cast_precision_loss)]
    fn init(fan_in: usize, fan_out: usize, rng: &mut ChaCha8Rng) -> Self {
        let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let weights = Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound));
        Self {
            weights,
            bias: Array1::zeros(fan_out),
        }
    }
}

/// First and second moment estimates for one layer.
struct Moments {
    weights: (Array2<f64>, Array2<f64>),
    bias: (Array1<f64>, Array1<f64>),
}

impl Moments {
    fn zeros_like(layer: &Layer) -> Self {
        Self {
            weights: (
                Array2::zeros(layer.weights.raw_dim()),
                Array2::zeros(layer.weights.raw_dim()),
            ),
            bias: (
                Array1::zeros(layer.bias.raw_dim()),
                Array1::zeros(layer.bias.raw_dim()),
            ),
        }
    }
}

/// Forward pass keeping every layer's activation (input first, output last).
fn forward(layers: &[Layer], activation: Activation, input: Array2<f64>) -> Vec<Array2<f64>> {
    let mut activations = Vec::with_capacity(layers.len() + 1);
    activations.push(input);
    for (i, layer) in layers.iter().enumerate() {
        let mut z = activations[i].dot(&layer.weights) + &layer.bias;
        if i + 1 == layers.len() {
            z.mapv_inplace(sigmoid);
        } else {
            activation.apply(&mut z);
        }
        activations.push(z);
    }
    activations
}

fn log_loss(proba: &Array2<f64>, targets: &Array2<f64>) -> f64 {
    let total: f64 = proba
        .iter()
        .zip(targets.iter())
        .map(|(&p, &y)| {
            let p = p.clamp(PROBA_CLIP, 1.0 - PROBA_CLIP);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let n = proba.len() as f64;
    total / n
}

impl Classifier for MlpClassifier {
    type Fitted = FittedMlp;

    #[allow(clippy::cast_precision_loss)]
    fn fit(&self, features: ArrayView2<'_, f64>, labels: &[u8]) -> Result<FittedMlp> {
        check_fit_input(features, labels)?;
        let params = &self.params;
        let mut rng = seeded_rng(params.random_state);

        let scaler = Standardizer::fit(features);
        let x = scaler.transform(features);
        let n_samples = x.nrows();
        let batch_size = params.batch_size.min(n_samples);

        let mut widths = Vec::with_capacity(params.hidden_layer_sizes.len() + 2);
        widths.push(x.ncols());
        widths.extend_from_slice(&params.hidden_layer_sizes);
        widths.push(1);

        let mut layers: Vec<Layer> = widths
            .windows(2)
            .map(|w| Layer::init(w[0], w[1], &mut rng))
            .collect();
        let mut moments: Vec<Moments> = layers.iter().map(Moments::zeros_like).collect();

        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0;
        let mut correction = BiasCorrection::default();
        let mut n_iter = 0;
        let mut final_loss = f64::NAN;

        for _ in 0..params.max_iter {
            n_iter += 1;
            if params.shuffle {
                order.shuffle(&mut rng);
            }

            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                let inputs = x.select(Axis(0), batch);
                let targets =
                    Array2::from_shape_fn((batch.len(), 1), |(i, _)| f64::from(labels[batch[i]]));
                let batch_n = batch.len() as f64;

                let activations = forward(&layers, params.activation, inputs);
                let output = &activations[layers.len()];

                let penalty: f64 = layers.iter().map(|l| l.weights.mapv(|w| w * w).sum()).sum();
                epoch_loss += (log_loss(output, &targets) + params.alpha * penalty / (2.0 * batch_n))
                    * batch_n;

                // Sigmoid + cross-entropy gradient
                let mut delta = (output - &targets) / batch_n;
                let (bias1, bias2) = correction.advance();

                for i in (0..layers.len()).rev() {
                    let grad_w = activations[i].t().dot(&delta)
                        + &layers[i].weights * (params.alpha / batch_n);
                    let grad_b = delta.sum_axis(Axis(0));

                    if i > 0 {
                        delta = delta.dot(&layers[i].weights.t())
                            * params.activation.derivative(&activations[i]);
                    }

                    let lr = params.learning_rate_init;
                    let m = &mut moments[i];
                    adam_update(&mut layers[i].weights, &grad_w, &mut m.weights, lr, bias1, bias2);
                    adam_update(&mut layers[i].bias, &grad_b, &mut m.bias, lr, bias1, bias2);
                }
            }

            final_loss = epoch_loss / n_samples as f64;
            if final_loss > best_loss - params.tol {
                stale_epochs += 1;
            } else {
                stale_epochs = 0;
            }
            best_loss = best_loss.min(final_loss);
            if stale_epochs >= params.n_iter_no_change {
                break;
            }
        }

        debug!(n_iter, loss = final_loss, "MLP training finished");
        Ok(FittedMlp {
            scaler,
            layers,
            activation: params.activation,
            n_iter,
            loss: final_loss,
        })
    }
}

fn adam_update<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f64, D>,
    grad: &ndarray::Array<f64, D>,
    (m, v): &mut (ndarray::Array<f64, D>, ndarray::Array<f64, D>),
    learning_rate: f64,
    bias1: f64,
    bias2: f64,
) {
    m.zip_mut_with(grad, |m, &g| *m = BETA1 * *m + (1.0 - BETA1) * g);
    v.zip_mut_with(grad, |v, &g| *v = BETA2 * *v + (1.0 - BETA2) * g * g);
    ndarray::Zip::from(param)
        .and(&*m)
        .and(&*v)
        .for_each(|p, &m, &v| {
            *p -= learning_rate * (m / bias1) / ((v / bias2).sqrt() + ADAM_EPSILON);
        });
}

/// Learned network state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedMlp {
    scaler: Standardizer,
    layers: Vec<Layer>,
    activation: Activation,
    n_iter: usize,
    loss: f64,
}

impl FittedMlp {
    /// Epochs run.
    #[must_use]
    pub const fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Mean training loss of the last epoch.
    #[must_use]
    pub const fn loss(&self) -> f64 {
        self.loss
    }

    /// Layer widths, input first and the single output unit last.
    #[must_use]
    pub fn layer_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.layers.iter().map(|l| l.weights.nrows()).collect();
        widths.push(1);
        widths
    }

    /// Training width.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Probability of the positive class per row.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] on a width mismatch
    pub fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        check_predict_input(features, self.n_features())?;
        let input = self.scaler.transform(features);
        let mut activations = forward(&self.layers, self.activation, input);
        let output = activations.pop().unwrap_or_default();
        Ok(output.iter().copied().collect())
    }
}

impl Predict for FittedMlp {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.into_iter().map(|p| u8::from(p > 0.5)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bias_correction_matches_closed_form() {
        let mut correction = BiasCorrection::default();
        for t in 1..=50 {
            let (bias1, bias2) = correction.advance();
            assert!((bias1 - (1.0 - BETA1.powi(t))).abs() < 1e-12);
            assert!((bias2 - (1.0 - BETA2.powi(t))).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bias_correction_settles_over_long_runs() {
        let mut correction = BiasCorrection::default();
        let mut last = (0.0, 0.0);
        for _ in 0..2_000_000 {
            last = correction.advance();
        }
        assert!((last.0 - 1.0).abs() < f64::EPSILON);
        assert!((last.1 - 1.0).abs() < f64::EPSILON);
    }

    fn separable() -> (Array2<f64>, Vec<u8>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [1.0, 0.9],
            [0.8, 1.0],
            [0.9, 0.7],
            [0.7, 0.8],
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    fn seeded() -> MlpClassifier {
        MlpClassifier::new(MlpParams {
            hidden_layer_sizes: vec![8],
            learning_rate_init: 0.05,
            max_iter: 300,
            random_state: Some(3),
            ..MlpParams::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_parsing() {
        let mut config = ModelConfig::new();
        config.insert("hidden_layer_sizes".to_string(), serde_json::json!([16, 8]));
        config.insert("activation".to_string(), serde_json::json!("tanh"));
        let mlp = MlpClassifier::from_config(&config).unwrap();
        assert_eq!(mlp.params().hidden_layer_sizes, vec![16, 8]);
        assert_eq!(mlp.params().activation, Activation::Tanh);
    }

    #[test]
    fn test_unknown_activation_rejected() {
        let mut config = ModelConfig::new();
        config.insert("activation".to_string(), serde_json::json!("swish"));
        assert!(matches!(
            MlpClassifier::from_config(&config),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_zero_width_layer_rejected() {
        let params = MlpParams {
            hidden_layer_sizes: vec![4, 0],
            ..MlpParams::default()
        };
        assert!(MlpClassifier::new(params).is_err());
    }

    #[test]
    fn test_learns_separable_data() {
        let (x, y) = separable();
        let fitted = seeded().fit(x.view(), &y).unwrap();
        assert_eq!(fitted.predict(x.view()).unwrap(), y);
        assert_eq!(fitted.layer_widths(), vec![2, 8, 1]);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = separable();
        assert_eq!(seeded().fit(x.view(), &y).unwrap(), seeded().fit(x.view(), &y).unwrap());
    }

    #[test]
    fn test_no_hidden_layers_is_logistic() {
        let (x, y) = separable();
        let mlp = MlpClassifier::new(MlpParams {
            hidden_layer_sizes: vec![],
            learning_rate_init: 0.1,
            random_state: Some(1),
            ..MlpParams::default()
        })
        .unwrap();
        let fitted = mlp.fit(x.view(), &y).unwrap();
        assert_eq!(fitted.layer_widths(), vec![2, 1]);
        assert!(fitted.loss().is_finite());
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = separable();
        let fitted = seeded().fit(x.view(), &y).unwrap();
        let proba = fitted.predict_proba(x.view()).unwrap();
        assert_eq!(proba.len(), 8);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}
