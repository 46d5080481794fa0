//! Version Comparator
//!
//! Turns the model versions of one lineage into a table ordered by version,
//! with the change in every metric relative to the previous version.
//!
//! ```text
//! version  accuracy  delta_accuracy
//! 1        0.70
//! 2        0.75      +0.05
//! 3        0.72      -0.03
//! ```

mod table;

pub use table::VersionTable;

use crate::experiment::TrackingStore;
use crate::train::MetricSet;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

/// Fixed leading columns of the version table file, before the metrics.
pub const KEY_COLUMNS: [&str; 3] = ["version", "stage", "run_id"];

/// Prefix given to a parameter column whose name would clash with a
/// fixed column of the version table file.
pub const PARAM_PREFIX: &str = "params.";

/// Prefix of the appended delta columns.
pub const DELTA_PREFIX: &str = "delta_";

/// One model version with the metrics and parameters of the run that
/// produced it. Any metric may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version label, usually an integer.
    pub version: String,
    /// Deployment stage name.
    pub stage: String,
    /// Producing run.
    pub run_id: String,
    /// Held-out accuracy.
    pub accuracy: Option<f64>,
    /// Held-out precision.
    pub precision: Option<f64>,
    /// Held-out recall.
    pub recall: Option<f64>,
    /// Held-out F1.
    pub f1: Option<f64>,
    /// Logged run parameters.
    pub params: BTreeMap<String, String>,
}

impl VersionRecord {
    /// Metric by name; `None` if unknown or missing.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "accuracy" => self.accuracy,
            "precision" => self.precision,
            "recall" => self.recall,
            "f1" => self.f1,
            _ => None,
        }
    }

    /// Set a metric by name. Unknown names are ignored.
    pub fn set_metric(&mut self, name: &str, value: Option<f64>) {
        match name {
            "accuracy" => self.accuracy = value,
            "precision" => self.precision = value,
            "recall" => self.recall = value,
            "f1" => self.f1 = value,
            _ => {}
        }
    }
}

/// Change of each metric against the preceding version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDeltas {
    /// Accuracy delta.
    pub accuracy: Option<f64>,
    /// Precision delta.
    pub precision: Option<f64>,
    /// Recall delta.
    pub recall: Option<f64>,
    /// F1 delta.
    pub f1: Option<f64>,
}

impl MetricDeltas {
    fn between(previous: &VersionRecord, current: &VersionRecord) -> Self {
        let delta = |name: &str| Some(current.metric(name)? - previous.metric(name)?);
        Self {
            accuracy: delta("accuracy"),
            precision: delta("precision"),
            recall: delta("recall"),
            f1: delta("f1"),
        }
    }

    /// Delta by metric name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "accuracy" => self.accuracy,
            "precision" => self.precision,
            "recall" => self.recall,
            "f1" => self.f1,
            _ => None,
        }
    }
}

/// Version ordering: integer labels numerically, before any non-integer
/// label; non-integer labels lexically.
fn version_order(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sort `records` by version and append the per-metric deltas.
///
/// The first row's deltas are empty, as is any delta with a missing
/// operand. The input is not modified.
#[must_use]
pub fn compute_deltas(records: &[VersionRecord]) -> VersionTable {
    let mut rows = records.to_vec();
    rows.sort_by(|a, b| version_order(&a.version, &b.version));

    let deltas = std::iter::once(MetricDeltas::default())
        .chain(rows.windows(2).map(|w| MetricDeltas::between(&w[0], &w[1])))
        .take(rows.len())
        .collect();

    VersionTable::with_deltas(rows, deltas)
}

/// Whether `name` is a fixed, metric or delta column rather than a
/// parameter.
pub(crate) fn is_reserved_column(name: &str) -> bool {
    KEY_COLUMNS.contains(&name) || MetricSet::NAMES.contains(&name) || name.starts_with(DELTA_PREFIX)
}

/// Collect every registered version of `lineage` with its run's metrics
/// and parameters, ascending by version.
///
/// # Errors
/// Returns [`crate::Error::ExternalStore`] if the store cannot be queried
/// or a version refers to an unknown run
pub fn fetch_model_versions<S: TrackingStore + ?Sized>(
    store: &S,
    lineage: &str,
) -> Result<VersionTable> {
    let versions = store.model_versions(lineage)?;
    let mut records = Vec::with_capacity(versions.len());
    for version in &versions {
        let snapshot = store.run_snapshot(version.run_id())?;
        let mut record = VersionRecord {
            version: version.version().to_string(),
            stage: version.stage().to_string(),
            run_id: version.run_id().to_string(),
            params: snapshot.run.params().clone(),
            ..VersionRecord::default()
        };
        for name in MetricSet::NAMES {
            record.set_metric(name, snapshot.metrics.get(name).copied());
        }
        records.push(record);
    }
    info!(lineage, versions = records.len(), "Fetched model versions");
    Ok(VersionTable::new(records))
}
