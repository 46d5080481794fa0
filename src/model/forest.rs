//! Random forest (`rf`)
//!
//! Bagged CART trees grown on Gini impurity with per-split feature
//! subsampling. Class probabilities are averaged across trees and the
//! positive class wins only on a strict majority.

use super::registry::{parse_params, ModelConfig, ModelKind};
use super::{check_fit_input, check_predict_input, seeded_rng, Classifier, Predict};
use crate::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    /// Exact count (clamped to the feature count)
    Count(usize),
    /// Fraction of the feature count, in (0, 1]
    Fraction(f64),
    /// Named rule
    Rule(FeatureRule),
}

/// Named feature subsampling rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRule {
    /// √n features
    Sqrt,
    /// log₂ n features
    Log2,
    /// Every feature
    All,
}

impl MaxFeatures {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn resolve(self, n_features: usize) -> usize {
        let count = match self {
            Self::Count(k) => k,
            Self::Fraction(f) => (f * n_features as f64).floor() as usize,
            Self::Rule(FeatureRule::Sqrt) => (n_features as f64).sqrt().floor() as usize,
            Self::Rule(FeatureRule::Log2) => (n_features as f64).log2().floor() as usize,
            Self::Rule(FeatureRule::All) => n_features,
        };
        count.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters for [`RandomForest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Depth limit; `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    /// Fewest samples a node needs to be split.
    pub min_samples_split: usize,
    /// Fewest samples allowed in a leaf.
    pub min_samples_leaf: usize,
    /// Features considered per split.
    pub max_features: MaxFeatures,
    /// Draw each tree's rows with replacement.
    pub bootstrap: bool,
    /// Seed; `None` seeds from OS entropy.
    pub random_state: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Rule(FeatureRule::Sqrt),
            bootstrap: true,
            random_state: None,
        }
    }
}

/// Unfitted random forest.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    params: ForestParams,
}

impl RandomForest {
    /// Build from validated parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for zero trees, a zero depth,
    /// `min_samples_split < 2`, `min_samples_leaf < 1`, or a
    /// `max_features` fraction outside (0, 1]
    pub fn new(params: ForestParams) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            model: ModelKind::RandomForest.identifier().to_string(),
            reason: reason.to_string(),
        };
        if params.n_estimators == 0 {
            return Err(invalid("n_estimators must be at least 1"));
        }
        if params.max_depth == Some(0) {
            return Err(invalid("max_depth must be at least 1"));
        }
        if params.min_samples_split < 2 {
            return Err(invalid("min_samples_split must be at least 2"));
        }
        if params.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf must be at least 1"));
        }
        match params.max_features {
            MaxFeatures::Count(0) => return Err(invalid("max_features must be at least 1")),
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(invalid("max_features fraction must be in (0, 1]"))
            }
            _ => {}
        }
        Ok(Self { params })
    }

    /// Build from a configuration mapping merged over the defaults.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for unknown names, bad types or
    /// out-of-range values
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(parse_params(ModelKind::RandomForest, config)?)
    }

    /// Effective hyperparameters.
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }
}

impl Classifier for RandomForest {
    type Fitted = FittedForest;

    fn fit(&self, features: ArrayView2<'_, f64>, labels: &[u8]) -> Result<FittedForest> {
        check_fit_input(features, labels)?;

        let n_samples = features.nrows();
        let n_features = features.ncols();
        let mut rng = seeded_rng(self.params.random_state);
        let grower = TreeGrower {
            features,
            labels,
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: self.params.max_features.resolve(n_features),
        };

        let trees = (0..self.params.n_estimators)
            .map(|_| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.gen());
                let rows: Vec<usize> = if self.params.bootstrap {
                    (0..n_samples)
                        .map(|_| tree_rng.gen_range(0..n_samples))
                        .collect()
                } else {
                    (0..n_samples).collect()
                };
                grower.grow(rows, &mut tree_rng)
            })
            .collect::<Vec<_>>();

        debug!(
            trees = trees.len(),
            max_nodes = trees.iter().map(|t| t.nodes.len()).max().unwrap_or(0),
            "Random forest grown"
        );
        Ok(FittedForest { trees, n_features })
    }
}

/// Tree node stored in a flat arena; children are arena indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Node {
    Leaf {
        /// Fraction of positive training samples in the leaf
        positive_rate: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One fitted CART tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn positive_rate(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf { positive_rate } => return positive_rate,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => at = if row[feature] <= threshold { left } else { right },
            }
        }
    }

    /// Number of nodes (splits and leaves).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

struct TreeGrower<'f, 'l> {
    features: ArrayView2<'f, f64>,
    labels: &'l [u8],
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: usize,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeGrower<'_, '_> {
    fn grow(&self, rows: Vec<usize>, rng: &mut ChaCha8Rng) -> DecisionTree {
        let mut nodes = Vec::new();
        self.build(&mut nodes, rows, 0, rng);
        DecisionTree { nodes }
    }

    #[allow(clippy::cast_precision_loss)]
    fn build(&self, nodes: &mut Vec<Node>, rows: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let at = nodes.len();
        let positives = rows.iter().filter(|&&r| self.labels[r] == 1).count();
        let positive_rate = positives as f64 / rows.len() as f64;
        nodes.push(Node::Leaf { positive_rate });

        let pure = positives == 0 || positives == rows.len();
        let deep = self.max_depth.is_some_and(|d| depth >= d);
        if pure || deep || rows.len() < self.min_samples_split {
            return at;
        }

        let Some(choice) = self.best_split(&rows, positives, rng) else {
            return at;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.features[[r, choice.feature]] <= choice.threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return at;
        }

        let left = self.build(nodes, left_rows, depth + 1, rng);
        let right = self.build(nodes, right_rows, depth + 1, rng);
        nodes[at] = Node::Split {
            feature: choice.feature,
            threshold: choice.threshold,
            left,
            right,
        };
        at
    }

    #[allow(clippy::cast_precision_loss)]
    fn best_split(&self, rows: &[usize], positives: usize, rng: &mut ChaCha8Rng) -> Option<SplitChoice> {
        let n = rows.len();
        let parent = gini(n, positives);
        let candidates = index::sample(rng, self.features.ncols(), self.max_features);

        let mut best: Option<SplitChoice> = None;
        let mut sorted = rows.to_vec();

        for feature in candidates.iter() {
            let column = self.features.column(feature);
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_pos = 0;
            for i in 0..n - 1 {
                left_pos += usize::from(self.labels[sorted[i]]);
                let left_n = i + 1;
                let right_n = n - left_n;

                let here = column[sorted[i]];
                let next = column[sorted[i + 1]];
                if !here.is_finite() || !next.is_finite() || here >= next {
                    continue;
                }
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let impurity = (left_n as f64 * gini(left_n, left_pos)
                    + right_n as f64 * gini(right_n, positives - left_pos))
                    / n as f64;

                if impurity < parent - 1e-12
                    && best.as_ref().map_or(true, |b| impurity < b.impurity)
                {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(SplitChoice {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

#[allow(clippy::cast_precision_loss)]
fn gini(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Learned random forest state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl FittedForest {
    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Training width.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean positive-class probability across trees, per row.
    ///
    /// # Errors
    /// Returns [`Error::DataShape`] on a width mismatch
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        check_predict_input(features, self.n_features)?;
        let n_trees = self.trees.len() as f64;
        Ok(features
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.positive_rate(row)).sum::<f64>() / n_trees)
            .collect())
    }
}

impl Predict for FittedForest {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.into_iter().map(|p| u8::from(p > 0.5)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    /// Positive band in the middle of x0; x1 is noise.
    fn band() -> (Array2<f64>, Vec<u8>) {
        let x = array![
            [0.0, 0.3],
            [0.1, 0.9],
            [0.2, 0.1],
            [0.4, 0.7],
            [0.5, 0.2],
            [0.6, 0.8],
            [0.8, 0.4],
            [0.9, 0.6],
            [1.0, 0.5],
        ];
        (x, vec![0, 0, 0, 1, 1, 1, 0, 0, 0])
    }

    fn seeded(n_estimators: usize) -> RandomForest {
        RandomForest::new(ForestParams {
            n_estimators,
            random_state: Some(42),
            ..ForestParams::default()
        })
        .unwrap()
    }

    #[test]
    fn test_defaults_from_empty_config() {
        let forest = RandomForest::from_config(&ModelConfig::new()).unwrap();
        assert_eq!(forest.params().n_estimators, 100);
        assert_eq!(forest.params().max_features, MaxFeatures::Rule(FeatureRule::Sqrt));
    }

    #[test]
    fn test_max_features_forms() {
        let mut config = ModelConfig::new();
        config.insert("max_features".to_string(), serde_json::json!("log2"));
        let forest = RandomForest::from_config(&config).unwrap();
        assert_eq!(forest.params().max_features, MaxFeatures::Rule(FeatureRule::Log2));

        config.insert("max_features".to_string(), serde_json::json!(3));
        let forest = RandomForest::from_config(&config).unwrap();
        assert_eq!(forest.params().max_features, MaxFeatures::Count(3));

        config.insert("max_features".to_string(), serde_json::json!(0.5));
        let forest = RandomForest::from_config(&config).unwrap();
        assert_eq!(forest.params().max_features, MaxFeatures::Fraction(0.5));
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Rule(FeatureRule::Sqrt).resolve(11), 3);
        assert_eq!(MaxFeatures::Rule(FeatureRule::Log2).resolve(11), 3);
        assert_eq!(MaxFeatures::Rule(FeatureRule::All).resolve(11), 11);
        assert_eq!(MaxFeatures::Count(50).resolve(11), 11);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(11), 1);
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let mut config = ModelConfig::new();
        config.insert("n_estimators".to_string(), serde_json::json!(0));
        assert!(matches!(
            RandomForest::from_config(&config),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut config = ModelConfig::new();
        config.insert("n_estimators".to_string(), serde_json::json!("many"));
        assert!(RandomForest::from_config(&config).is_err());
    }

    #[test]
    fn test_fits_nonlinear_boundary() {
        let (x, y) = band();
        let forest = RandomForest::new(ForestParams {
            n_estimators: 25,
            bootstrap: false,
            max_features: MaxFeatures::Rule(FeatureRule::All),
            random_state: Some(7),
            ..ForestParams::default()
        })
        .unwrap();
        let fitted = forest.fit(x.view(), &y).unwrap();

        assert_eq!(fitted.trees().len(), 25);
        assert_eq!(fitted.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = band();
        let a = seeded(10).fit(x.view(), &y).unwrap();
        let b = seeded(10).fit(x.view(), &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_depth_one_gives_stumps() {
        let (x, y) = band();
        let forest = RandomForest::new(ForestParams {
            n_estimators: 5,
            max_depth: Some(1),
            random_state: Some(1),
            ..ForestParams::default()
        })
        .unwrap();
        let fitted = forest.fit(x.view(), &y).unwrap();
        assert!(fitted.trees().iter().all(|t| t.node_count() <= 3));
    }

    #[test]
    fn test_pure_labels_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let fitted = seeded(3).fit(x.view(), &[1, 1, 1]).unwrap();
        assert!(fitted.trees().iter().all(|t| t.node_count() == 1));
        assert_eq!(fitted.predict(x.view()).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = band();
        let fitted = seeded(10).fit(x.view(), &y).unwrap();
        let proba = fitted.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_fit_rejects_non_finite_features() {
        let x = array![[1.0], [2.0], [f64::NAN], [4.0]];
        let err = seeded(5).fit(x.view(), &[0, 0, 1, 1]).unwrap_err();
        assert!(matches!(err, Error::DataShape(_)));

        let x = array![[1.0], [f64::INFINITY]];
        assert!(seeded(5).fit(x.view(), &[0, 1]).is_err());
    }

    #[test]
    fn test_grower_never_splits_on_non_finite_values() {
        let x = array![
            [1.0],
            [2.0],
            [3.0],
            [4.0],
            [5.0],
            [6.0],
            [7.0],
            [8.0],
            [f64::NAN],
            [f64::NAN]
        ];
        let y = [0, 1, 0, 1, 0, 1, 0, 1, 1, 0];
        let grower = TreeGrower {
            features: x.view(),
            labels: &y,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        };
        let tree = grower.grow((0..y.len()).collect(), &mut ChaCha8Rng::seed_from_u64(5));

        for node in &tree.nodes {
            if let Node::Split { threshold, .. } = node {
                assert!(threshold.is_finite());
            }
        }
    }

    #[test]
    fn test_gini() {
        assert!(gini(4, 0).abs() < f64::EPSILON);
        assert!(gini(4, 4).abs() < f64::EPSILON);
        assert!((gini(4, 2) - 0.5).abs() < f64::EPSILON);
    }
}
