//! Model and metrics artifacts on disk
//!
//! Layout inside the output directory:
//!
//! ```text
//! {dir}/{identifier}.json   serialized TrainedModel
//! {dir}/metrics.json        MetricSet
//! ```
//!
//! Writes are atomic (temp file + rename), so a crash never leaves a
//! truncated artifact behind.

use super::MetricSet;
use crate::model::TrainedModel;
use crate::storage::write_atomic;
use crate::Result;
use std::path::{Path, PathBuf};

/// File name of the metrics artifact.
pub const METRICS_FILE: &str = "metrics.json";

/// Path the model artifact for `identifier` is written to.
#[must_use]
pub fn model_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{identifier}.json"))
}

/// Serialize `model` to `{dir}/{identifier}.json`, creating `dir` as needed.
///
/// # Errors
/// Returns [`crate::Error::Io`] or [`crate::Error::Json`] on failure
pub fn save_model(dir: &Path, identifier: &str, model: &TrainedModel) -> Result<PathBuf> {
    let path = model_path(dir, identifier);
    write_atomic(&path, &serde_json::to_vec(model)?)?;
    Ok(path)
}

/// Serialize `metrics` to `{dir}/metrics.json`.
///
/// # Errors
/// Returns [`crate::Error::Io`] or [`crate::Error::Json`] on failure
pub fn save_metrics(dir: &Path, metrics: &MetricSet) -> Result<PathBuf> {
    let path = dir.join(METRICS_FILE);
    write_atomic(&path, &serde_json::to_vec_pretty(metrics)?)?;
    Ok(path)
}

/// Read a model artifact back.
///
/// # Errors
/// Returns [`crate::Error::Io`] if unreadable, [`crate::Error::Json`] if
/// the content is not a serialized model
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

/// Read a metrics artifact back.
///
/// # Errors
/// Returns [`crate::Error::Io`] or [`crate::Error::Json`] on failure
pub fn load_metrics(path: &Path) -> Result<MetricSet> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}
