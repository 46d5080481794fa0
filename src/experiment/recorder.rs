//! Scoped run context and the one-call run recorder

use super::{ArtifactRecord, ModelVersionRecord, RunStatus, TrackingStore};
use crate::train::MetricSet;
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// An open run.
///
/// Every log call is attributed to the same run id. Close it with
/// [`ActiveRun::finish`]; if it is dropped first (an early `?` return), the
/// run is ended as [`RunStatus::Failed`].
#[derive(Debug)]
pub struct ActiveRun<'s, S: TrackingStore + ?Sized> {
    store: &'s mut S,
    run_id: String,
    finished: bool,
}

impl<'s, S: TrackingStore + ?Sized> ActiveRun<'s, S> {
    /// Get or create `experiment` and open a run named `run_name` in it.
    ///
    /// # Errors
    /// Returns [`crate::Error::ExternalStore`] if the backend rejects either
    /// call
    pub fn start(store: &'s mut S, experiment: &str, run_name: &str) -> Result<Self> {
        let experiment_id = store.create_experiment(experiment)?;
        let run_id = store.start_run(&experiment_id, run_name)?;
        info!(%run_id, experiment, run_name, "Started run");
        Ok(Self {
            store,
            run_id,
            finished: false,
        })
    }

    /// ID of this run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log one parameter.
    ///
    /// # Errors
    /// See [`TrackingStore::log_param`]
    pub fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.store.log_param(&self.run_id, key, value)
    }

    /// Log every parameter in `params`.
    ///
    /// # Errors
    /// Stops at the first rejected entry; earlier entries stay logged
    pub fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
        params.iter().try_for_each(|(k, v)| self.log_param(k, v))
    }

    /// Log one metric value.
    ///
    /// # Errors
    /// See [`TrackingStore::log_metric`]
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.store.log_metric(&self.run_id, key, value)
    }

    /// Log every value of a metric set.
    ///
    /// # Errors
    /// Stops at the first rejected value
    pub fn log_metrics(&mut self, metrics: &MetricSet) -> Result<()> {
        metrics
            .iter()
            .try_for_each(|(key, value)| self.log_metric(key, value))
    }

    /// Attach a file.
    ///
    /// # Errors
    /// See [`TrackingStore::log_artifact`]
    pub fn log_artifact(&mut self, path: &Path) -> Result<ArtifactRecord> {
        self.store.log_artifact(&self.run_id, path)
    }

    /// Register the model artifact at `source` as the next version of
    /// `lineage`.
    ///
    /// # Errors
    /// See [`TrackingStore::register_model_version`]
    pub fn register_model(&mut self, lineage: &str, source: &Path) -> Result<ModelVersionRecord> {
        let source = source.display().to_string();
        self.store.register_model_version(lineage, &self.run_id, &source)
    }

    /// Close the run as [`RunStatus::Finished`] and return its id.
    ///
    /// # Errors
    /// Returns [`crate::Error::ExternalStore`] if the backend rejects the
    /// close; the run is then left as the backend has it
    pub fn finish(mut self) -> Result<String> {
        self.finished = true;
        self.store.end_run(&self.run_id, RunStatus::Finished)?;
        info!(run_id = %self.run_id, "Finished run");
        Ok(std::mem::take(&mut self.run_id))
    }
}

impl<S: TrackingStore + ?Sized> Drop for ActiveRun<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(run_id = %self.run_id, "Run dropped before finishing; marking failed");
        if let Err(e) = self.store.end_run(&self.run_id, RunStatus::Failed) {
            warn!(run_id = %self.run_id, error = %e, "Could not mark run failed");
        }
    }
}

/// What [`record_run`] created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    /// Closed run.
    pub run_id: String,
    /// Newly registered model version.
    pub model_version: ModelVersionRecord,
}

/// Record one completed training run.
///
/// Opens a run named `run_name` in `experiment`, logs `parameters` and
/// `metrics`, attaches both artifacts, registers `model_artifact` as the
/// next version of `lineage` and closes the run. On error the run is
/// closed as failed and entries already logged stay in the store.
///
/// # Errors
/// Propagates the first backend or I/O failure
#[allow(clippy::too_many_arguments)]
pub fn record_run<S: TrackingStore + ?Sized>(
    store: &mut S,
    experiment: &str,
    run_name: &str,
    parameters: &BTreeMap<String, String>,
    metrics: &MetricSet,
    model_artifact: &Path,
    metrics_artifact: &Path,
    lineage: &str,
) -> Result<RecordedRun> {
    let mut run = ActiveRun::start(store, experiment, run_name)?;
    run.log_params(parameters)?;
    run.log_metrics(metrics)?;
    run.log_artifact(model_artifact)?;
    run.log_artifact(metrics_artifact)?;
    let model_version = run.register_model(lineage, model_artifact)?;
    info!(
        lineage,
        version = model_version.version(),
        "Registered model version"
    );
    let run_id = run.finish()?;
    Ok(RecordedRun {
        run_id,
        model_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExperimentStore, ModelStage};
    use crate::Error;
    use tempfile::TempDir;

    fn metrics() -> MetricSet {
        MetricSet {
            accuracy: 0.8,
            precision: 0.75,
            recall: 0.6,
            f1: 2.0 / 3.0,
        }
    }

    fn artifacts(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let model = dir.path().join("rf.json");
        let metrics = dir.path().join("metrics.json");
        std::fs::write(&model, b"{\"model\":\"random_forest\"}").unwrap();
        std::fs::write(&metrics, b"{\"accuracy\":0.8}").unwrap();
        (model, metrics)
    }

    #[test]
    fn test_dropped_run_is_failed() {
        let mut store = ExperimentStore::new();
        let run_id = {
            let run = ActiveRun::start(&mut store, "e", "r").unwrap();
            run.run_id().to_string()
        };
        assert_eq!(store.get_run(&run_id).unwrap().status(), RunStatus::Failed);
    }

    #[test]
    fn test_finished_run_is_finished() {
        let mut store = ExperimentStore::new();
        let mut run = ActiveRun::start(&mut store, "e", "r").unwrap();
        run.log_metric("accuracy", 0.9).unwrap();
        let run_id = run.finish().unwrap();
        assert_eq!(store.get_run(&run_id).unwrap().status(), RunStatus::Finished);
    }

    #[test]
    fn test_record_run_attributes_everything_to_one_run() {
        let dir = TempDir::new().unwrap();
        let (model, metrics_path) = artifacts(&dir);
        let mut store = ExperimentStore::new();
        let params = BTreeMap::from([
            ("model_name".to_string(), "rf".to_string()),
            ("n_estimators".to_string(), "100".to_string()),
        ]);

        let recorded = record_run(
            &mut store,
            "wine-quality-demo",
            "rf_run",
            &params,
            &metrics(),
            &model,
            &metrics_path,
            "wq-demo-rf",
        )
        .unwrap();

        assert_eq!(recorded.model_version.version(), 1);
        assert_eq!(recorded.model_version.stage(), ModelStage::None);
        assert_eq!(recorded.model_version.run_id(), recorded.run_id);

        let snapshot = store.run_snapshot(&recorded.run_id).unwrap();
        assert_eq!(snapshot.run.status(), RunStatus::Finished);
        assert_eq!(snapshot.run.params(), &params);
        assert_eq!(snapshot.metrics.len(), 4);
        assert_eq!(snapshot.artifacts.len(), 2);
    }

    #[test]
    fn test_record_run_failure_keeps_partial_log() {
        let dir = TempDir::new().unwrap();
        let (model, _) = artifacts(&dir);
        let missing = dir.path().join("absent.json");
        let mut store = ExperimentStore::new();

        let err = record_run(
            &mut store,
            "e",
            "lr_run",
            &BTreeMap::new(),
            &metrics(),
            &model,
            &missing,
            "wq-demo-lr",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        let experiment = store.experiment_by_name("e").unwrap().experiment_id().to_string();
        let run = store.get_runs_for_experiment(&experiment)[0].clone();
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(store.get_metrics_for_run(run.run_id(), "accuracy").len(), 1);
        assert!(store.model_versions("wq-demo-lr").unwrap().is_empty());
    }
}
