//! Tracking store - the backend runs, metrics and model versions go to
//!
//! [`TrackingStore`] is the seam between the recorder and a backend.
//! [`ExperimentStore`] keeps everything in memory;
//! [`super::FileTrackingStore`] wraps it and persists after every write.

use super::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ModelVersionRecord, RunRecord, RunStatus,
};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Backend for experiment tracking.
///
/// Every mutating call is applied immediately; there is no transaction, so
/// a failure partway through a run leaves earlier entries in place.
pub trait TrackingStore {
    /// Return the ID of the experiment called `name`, creating it if absent.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] if the backend rejects the write
    fn create_experiment(&mut self, name: &str) -> Result<String>;

    /// Open a run under `experiment_id` and return its ID.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown experiment
    fn start_run(&mut self, experiment_id: &str, run_name: &str) -> Result<String>;

    /// Attach a string parameter to an open run.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown or closed run, or a
    /// conflicting value
    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Append a metric value to an open run.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown or closed run, or a
    /// non-finite value
    fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> Result<()>;

    /// Hash and attach the file at `path` to an open run.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown or closed run and
    /// [`Error::Io`] if the file cannot be read
    fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<ArtifactRecord>;

    /// Register the model at `source` as the next version of `lineage`.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown run
    fn register_model_version(
        &mut self,
        lineage: &str,
        run_id: &str,
        source: &str,
    ) -> Result<ModelVersionRecord>;

    /// Close a run.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown or already closed run
    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()>;

    /// All versions of `lineage`, ascending by version. Empty if unknown.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] if the backend cannot be queried
    fn model_versions(&self, lineage: &str) -> Result<Vec<ModelVersionRecord>>;

    /// Everything recorded against one run.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for an unknown run
    fn run_snapshot(&self, run_id: &str) -> Result<RunSnapshot>;
}

/// Point-in-time view of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    /// Run metadata and parameters.
    pub run: RunRecord,
    /// Latest value per metric key.
    pub metrics: BTreeMap<String, f64>,
    /// Attached artifacts, in logging order.
    pub artifacts: Vec<ArtifactRecord>,
}

/// In-memory tracking store.
///
/// Lookups by ID go through hash maps; metric history is a flat vector
/// filtered per query.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExperimentStore {
    experiments: FxHashMap<String, ExperimentRecord>,
    runs: FxHashMap<String, RunRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
    model_versions: Vec<ModelVersionRecord>,
    next_run: u64,
}

impl ExperimentStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store holds no experiments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Get the number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metric data points.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(experiment_id)
    }

    /// Find an experiment by name.
    #[must_use]
    pub fn experiment_by_name(&self, name: &str) -> Option<&ExperimentRecord> {
        self.experiments.values().find(|e| e.name() == name)
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// Get all runs for an experiment, oldest first.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self
            .runs
            .values()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect();
        runs.sort_by(|a, b| a.run_id().cmp(b.run_id()));
        runs
    }

    /// Metric history for one run and key, ordered by step.
    #[must_use]
    pub fn get_metrics_for_run(&self, run_id: &str, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .cloned()
            .collect();
        metrics.sort_by_key(MetricRecord::step);
        metrics
    }

    fn run_mut(&mut self, run_id: &str) -> Result<&mut RunRecord> {
        self.runs
            .get_mut(run_id)
            .ok_or_else(|| Error::ExternalStore(format!("unknown run `{run_id}`")))
    }

    fn active_run(&mut self, run_id: &str) -> Result<&mut RunRecord> {
        let run = self.run_mut(run_id)?;
        run.ensure_active()?;
        Ok(run)
    }
}

impl TrackingStore for ExperimentStore {
    fn create_experiment(&mut self, name: &str) -> Result<String> {
        if let Some(existing) = self.experiment_by_name(name) {
            return Ok(existing.experiment_id().to_string());
        }
        let experiment_id = self.experiments.len().to_string();
        debug!(%experiment_id, name, "Created experiment");
        self.experiments.insert(
            experiment_id.clone(),
            ExperimentRecord::new(experiment_id.clone(), name),
        );
        Ok(experiment_id)
    }

    fn start_run(&mut self, experiment_id: &str, run_name: &str) -> Result<String> {
        if !self.experiments.contains_key(experiment_id) {
            return Err(Error::ExternalStore(format!(
                "unknown experiment `{experiment_id}`"
            )));
        }
        self.next_run += 1;
        let run_id = format!("run-{:06}", self.next_run);
        self.runs.insert(
            run_id.clone(),
            RunRecord::new(run_id.clone(), experiment_id, run_name),
        );
        Ok(run_id)
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.run_mut(run_id)?.set_param(key, value)
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.active_run(run_id)?;
        if !value.is_finite() {
            return Err(Error::ExternalStore(format!(
                "metric `{key}` has non-finite value {value}"
            )));
        }
        let step = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .count() as u64;
        self.metrics.push(MetricRecord::new(run_id, key, step, value));
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<ArtifactRecord> {
        self.active_run(run_id)?;
        let artifact = ArtifactRecord::from_file(run_id, path)?;
        self.artifacts.push(artifact.clone());
        Ok(artifact)
    }

    fn register_model_version(
        &mut self,
        lineage: &str,
        run_id: &str,
        source: &str,
    ) -> Result<ModelVersionRecord> {
        self.run_mut(run_id)?;
        let version = self
            .model_versions
            .iter()
            .filter(|v| v.lineage() == lineage)
            .map(ModelVersionRecord::version)
            .max()
            .unwrap_or(0)
            + 1;
        let record = ModelVersionRecord::new(lineage, version, run_id, source);
        self.model_versions.push(record.clone());
        Ok(record)
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        self.run_mut(run_id)?.finish(status)
    }

    fn model_versions(&self, lineage: &str) -> Result<Vec<ModelVersionRecord>> {
        let mut versions: Vec<ModelVersionRecord> = self
            .model_versions
            .iter()
            .filter(|v| v.lineage() == lineage)
            .cloned()
            .collect();
        versions.sort_by_key(ModelVersionRecord::version);
        Ok(versions)
    }

    fn run_snapshot(&self, run_id: &str) -> Result<RunSnapshot> {
        let run = self
            .get_run(run_id)
            .ok_or_else(|| Error::ExternalStore(format!("unknown run `{run_id}`")))?
            .clone();

        let mut latest: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        for metric in self.metrics.iter().filter(|m| m.run_id() == run_id) {
            let entry = latest
                .entry(metric.key().to_string())
                .or_insert((metric.step(), metric.value()));
            if metric.step() >= entry.0 {
                *entry = (metric.step(), metric.value());
            }
        }

        Ok(RunSnapshot {
            run,
            metrics: latest.into_iter().map(|(k, (_, v))| (k, v)).collect(),
            artifacts: self
                .artifacts
                .iter()
                .filter(|a| a.run_id() == run_id)
                .cloned()
                .collect(),
        })
    }
}
