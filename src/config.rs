//! Pipeline configuration
//!
//! `params.yaml` is read once at the program boundary into
//! [`PipelineParams`]; command-line choices are folded in to produce a
//! [`TrainConfig`], which is then passed by reference to the trainer and
//! recorder.
//!
//! ```yaml
//! train:
//!   model_name: rf
//!   test_size: 0.2
//!   random_state: 121212
//! model:
//!   rf: { n_estimators: 100, max_depth: 10 }
//!   lr: { max_iter: 1000 }
//! ```

use crate::model::{ModelConfig, ModelSpec};
use crate::train::{SplitConfig, DEFAULT_SEED, DEFAULT_TEST_FRACTION};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default experiment name.
pub const DEFAULT_EXPERIMENT: &str = "wine-quality-demo";

/// `train:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainSection {
    /// Model identifier used when none is given on the command line.
    pub model_name: String,
    /// Held-out fraction.
    pub test_size: f64,
    /// Split seed.
    pub random_state: u64,
}

impl Default for TrainSection {
    fn default() -> Self {
        Self {
            model_name: "rf".to_string(),
            test_size: DEFAULT_TEST_FRACTION,
            random_state: DEFAULT_SEED,
        }
    }
}

/// Contents of `params.yaml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Split and default model choice.
    pub train: TrainSection,
    /// Per-identifier model parameters.
    pub model: BTreeMap<String, ModelConfig>,
}

impl PipelineParams {
    /// Parse YAML text.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the text is not a valid parameter file
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a parameter file.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file is unreadable or malformed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Configuration for `identifier`; empty when the section is absent.
    #[must_use]
    pub fn model_config(&self, identifier: &str) -> ModelConfig {
        self.model.get(identifier).cloned().unwrap_or_default()
    }

    /// Split settings from the `train:` section.
    #[must_use]
    pub const fn split_config(&self) -> SplitConfig {
        SplitConfig {
            test_fraction: self.train.test_size,
            seed: self.train.random_state,
        }
    }
}

/// Everything one `train` invocation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Prepared dataset file.
    pub data_path: PathBuf,
    /// Label column.
    pub target: String,
    /// Resolved model choice.
    pub model: ModelSpec,
    /// Split settings.
    pub split: SplitConfig,
    /// Directory for the model and metrics artifacts.
    pub output_dir: PathBuf,
    /// Experiment to record under.
    pub experiment: String,
    /// Run name.
    pub run_name: String,
    /// Model lineage to register under.
    pub lineage: String,
}

impl TrainConfig {
    /// Combine parameters with command-line choices. `model_override`
    /// takes precedence over `train.model_name`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownModel`] if the chosen identifier is not
    /// registered
    pub fn from_params(
        params: &PipelineParams,
        data_path: impl Into<PathBuf>,
        target: impl Into<String>,
        model_override: Option<&str>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let identifier = model_override.unwrap_or(&params.train.model_name);
        let model = ModelSpec::resolve(identifier, params.model_config(identifier))?;
        let id = model.identifier();
        Ok(Self {
            data_path: data_path.into(),
            target: target.into(),
            split: params.split_config(),
            output_dir: output_dir.into(),
            experiment: DEFAULT_EXPERIMENT.to_string(),
            run_name: format!("{id}_run"),
            lineage: format!("wq-demo-{id}"),
            model,
        })
    }

    /// Override the experiment name.
    #[must_use]
    pub fn with_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.experiment = experiment.into();
        self
    }

    /// Override the run name.
    #[must_use]
    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = run_name.into();
        self
    }

    /// Override the lineage.
    #[must_use]
    pub fn with_lineage(mut self, lineage: impl Into<String>) -> Self {
        self.lineage = lineage.into();
        self
    }
}
