//! Directory-backed tracking store
//!
//! The whole store is one JSON document at `{root}/store.json`. It is read
//! on open and rewritten atomically after every mutating call, so a second
//! process opening the same root sees every completed write. Concurrent
//! writers are not coordinated; the last flush wins.

use super::{ArtifactRecord, ExperimentStore, ModelVersionRecord, RunSnapshot, RunStatus, TrackingStore};
use crate::storage::write_atomic;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the persisted document inside the tracking root.
pub const STORE_FILE: &str = "store.json";

/// [`TrackingStore`] persisted under a directory.
#[derive(Debug)]
pub struct FileTrackingStore {
    root: PathBuf,
    inner: ExperimentStore,
}

impl FileTrackingStore {
    /// Open the store at `root`, starting empty if nothing has been
    /// written there yet.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] if an existing store file cannot be
    /// read or parsed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(STORE_FILE);
        let inner = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| {
                Error::ExternalStore(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_json::from_slice(&bytes).map_err(|e| {
                Error::ExternalStore(format!("corrupt tracking store {}: {e}", path.display()))
            })?
        } else {
            ExperimentStore::new()
        };
        debug!(root = %root.display(), runs = inner.run_count(), "Opened tracking store");
        Ok(Self { root, inner })
    }

    /// Tracking root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read-only view of the loaded data.
    #[must_use]
    pub const fn store(&self) -> &ExperimentStore {
        &self.inner
    }

    fn flush(&self) -> Result<()> {
        let path = self.root.join(STORE_FILE);
        let bytes = serde_json::to_vec_pretty(&self.inner)?;
        write_atomic(&path, &bytes)
            .map_err(|e| Error::ExternalStore(format!("cannot write {}: {e}", path.display())))
    }

    fn persisted<T>(&mut self, op: impl FnOnce(&mut ExperimentStore) -> Result<T>) -> Result<T> {
        let value = op(&mut self.inner)?;
        self.flush()?;
        Ok(value)
    }
}

impl TrackingStore for FileTrackingStore {
    fn create_experiment(&mut self, name: &str) -> Result<String> {
        self.persisted(|s| s.create_experiment(name))
    }

    fn start_run(&mut self, experiment_id: &str, run_name: &str) -> Result<String> {
        self.persisted(|s| s.start_run(experiment_id, run_name))
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.persisted(|s| s.log_param(run_id, key, value))
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.persisted(|s| s.log_metric(run_id, key, value))
    }

    fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<ArtifactRecord> {
        self.persisted(|s| s.log_artifact(run_id, path))
    }

    fn register_model_version(
        &mut self,
        lineage: &str,
        run_id: &str,
        source: &str,
    ) -> Result<ModelVersionRecord> {
        self.persisted(|s| s.register_model_version(lineage, run_id, source))
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        self.persisted(|s| s.end_run(run_id, status))
    }

    fn model_versions(&self, lineage: &str) -> Result<Vec<ModelVersionRecord>> {
        self.inner.model_versions(lineage)
    }

    fn run_snapshot(&self, run_id: &str) -> Result<RunSnapshot> {
        self.inner.run_snapshot(run_id)
    }
}
