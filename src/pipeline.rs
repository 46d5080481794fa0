//! End-to-end `train` flow
//!
//! ```text
//! load ──> train_and_evaluate ──> save_model / save_metrics ──> record_run
//! ```

use crate::config::TrainConfig;
use crate::dataset::Dataset;
use crate::experiment::{record_run, RecordedRun, TrackingStore};
use crate::model::TrainedModel;
use crate::train::persist::{save_metrics, save_model};
use crate::train::{train_and_evaluate, MetricSet};
use crate::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Result of a completed `train` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    /// Fitted model.
    pub model: TrainedModel,
    /// Held-out metrics.
    pub metrics: MetricSet,
    /// Written model artifact.
    pub model_path: PathBuf,
    /// Written metrics artifact.
    pub metrics_path: PathBuf,
    /// Tracking run and registered version.
    pub recorded: RecordedRun,
}

/// Parameters recorded for a run: the pipeline settings plus every
/// effective model hyperparameter, rendered as strings.
///
/// # Errors
/// Returns [`crate::Error::InvalidParameter`] if the model configuration is
/// rejected
pub fn run_parameters(config: &TrainConfig) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::from([
        ("model_name".to_string(), config.model.identifier().to_string()),
        ("data_path".to_string(), config.data_path.display().to_string()),
        ("target".to_string(), config.target.clone()),
        ("test_size".to_string(), config.split.test_fraction.to_string()),
        ("split_seed".to_string(), config.split.seed.to_string()),
    ]);
    if let serde_json::Value::Object(model_params) = config.model.build()?.params() {
        for (key, value) in model_params {
            let rendered = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            params.insert(key, rendered);
        }
    }
    Ok(params)
}

/// Run one tracked training invocation.
///
/// Artifacts are written only after evaluation succeeds, and the run is
/// recorded only after both artifacts exist.
///
/// # Errors
/// Propagates the first failure of any step; see [`crate::Error`]
pub fn run_training<S: TrackingStore + ?Sized>(
    config: &TrainConfig,
    store: &mut S,
) -> Result<TrainingOutcome> {
    let dataset = Dataset::read(&config.data_path)?;
    info!(
        path = %config.data_path.display(),
        rows = dataset.num_rows(),
        columns = dataset.num_columns(),
        "Loaded training data"
    );

    let parameters = run_parameters(config)?;
    let (model, metrics) =
        train_and_evaluate(&dataset, &config.target, &config.model, &config.split)?;

    let model_path = save_model(&config.output_dir, config.model.identifier(), &model)?;
    let metrics_path = save_metrics(&config.output_dir, &metrics)?;
    info!(
        model = %model_path.display(),
        metrics = %metrics_path.display(),
        "Saved artifacts"
    );

    let recorded = record_run(
        store,
        &config.experiment,
        &config.run_name,
        &parameters,
        &metrics,
        &model_path,
        &metrics_path,
        &config.lineage,
    )?;

    Ok(TrainingOutcome {
        model,
        metrics,
        model_path,
        metrics_path,
        recorded,
    })
}
