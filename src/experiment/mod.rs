//! Experiment Recorder
//!
//! Records each training run (parameters, metrics, artifacts) and registers
//! the produced model as a numbered version of a lineage.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N) ── params
//!                              │
//!                              ├──< MetricRecord (N) [history per key]
//!                              ├──< ArtifactRecord (N) [CAS]
//!                              └──< ModelVersionRecord (N) [per lineage]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_mlops::experiment::{ActiveRun, ExperimentStore, RunStatus, TrackingStore};
//!
//! let mut store = ExperimentStore::new();
//! let mut run = ActiveRun::start(&mut store, "wine-quality-demo", "rf_run")?;
//! run.log_param("model_name", "rf")?;
//! run.log_metric("accuracy", 0.81)?;
//! let run_id = run.finish()?;
//!
//! assert_eq!(store.run_snapshot(&run_id)?.run.status(), RunStatus::Finished);
//! # Ok::<(), trueno_mlops::Error>(())
//! ```

mod artifact_record;
mod experiment_record;
mod file_store;
mod metric_record;
mod model_version;
mod recorder;
mod run_record;
mod store;

pub use artifact_record::{content_hash, ArtifactRecord};
pub use experiment_record::ExperimentRecord;
pub use file_store::{FileTrackingStore, STORE_FILE};
pub use metric_record::MetricRecord;
pub use model_version::{ModelStage, ModelVersionRecord};
pub use recorder::{record_run, ActiveRun, RecordedRun};
pub use run_record::{RunRecord, RunStatus};
pub use store::{ExperimentStore, RunSnapshot, TrackingStore};
