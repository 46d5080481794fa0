//! Version table: columnar form, CSV file and console rendering

use super::{
    compute_deltas, is_reserved_column, MetricDeltas, VersionRecord, DELTA_PREFIX, KEY_COLUMNS,
    PARAM_PREFIX,
};
use crate::storage::{encode_csv, load_csv, write_atomic};
use crate::train::MetricSet;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Model versions of one lineage, optionally with metric deltas.
///
/// Column layout: `version, stage, run_id, accuracy, precision, recall, f1`,
/// then one column per logged parameter, then `delta_{metric}` columns when
/// deltas have been computed. A parameter whose name clashes with one of
/// the other columns is written as `params.{name}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionTable {
    rows: Vec<VersionRecord>,
    param_columns: Vec<String>,
    deltas: Option<Vec<MetricDeltas>>,
}

impl VersionTable {
    /// Table without deltas. Parameter columns are the sorted union of
    /// the rows' parameter names.
    #[must_use]
    pub fn new(rows: Vec<VersionRecord>) -> Self {
        let param_columns = param_union(&rows);
        Self {
            rows,
            param_columns,
            deltas: None,
        }
    }

    pub(crate) fn with_deltas(rows: Vec<VersionRecord>, deltas: Vec<MetricDeltas>) -> Self {
        Self {
            param_columns: param_union(&rows),
            rows,
            deltas: Some(deltas),
        }
    }

    /// Rows ordered by version with the per-metric deltas appended.
    ///
    /// Same as [`compute_deltas`] over [`Self::rows`], except that the
    /// parameter columns keep this table's order.
    #[must_use]
    pub fn with_version_deltas(&self) -> Self {
        let mut table = compute_deltas(&self.rows);
        table.param_columns.clone_from(&self.param_columns);
        table
    }

    /// Rows in table order.
    #[must_use]
    pub fn rows(&self) -> &[VersionRecord] {
        &self.rows
    }

    /// Per-row deltas, if computed.
    #[must_use]
    pub fn deltas(&self) -> Option<&[MetricDeltas]> {
        self.deltas.as_deref()
    }

    /// Number of versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parameter names in column order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_columns
    }

    /// Columnar form of the table.
    ///
    /// # Errors
    /// Returns [`Error::Arrow`] if the batch cannot be assembled
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let text = |f: fn(&VersionRecord) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(self.rows.iter().map(f)))
        };

        let mut columns: Vec<(String, ArrayRef)> = vec![
            ("version".to_string(), text(|r| r.version.as_str())),
            ("stage".to_string(), text(|r| r.stage.as_str())),
            ("run_id".to_string(), text(|r| r.run_id.as_str())),
        ];
        for name in MetricSet::NAMES {
            let values: Float64Array = self.rows.iter().map(|r| r.metric(name)).collect();
            columns.push((name.to_string(), Arc::new(values)));
        }
        for param in &self.param_columns {
            let values: StringArray = self
                .rows
                .iter()
                .map(|r| r.params.get(param).map(String::as_str))
                .collect();
            columns.push((param_column_name(param), Arc::new(values)));
        }
        if let Some(deltas) = &self.deltas {
            for name in MetricSet::NAMES {
                let values: Float64Array = deltas.iter().map(|d| d.get(name)).collect();
                columns.push((format!("{DELTA_PREFIX}{name}"), Arc::new(values)));
            }
        }

        Ok(RecordBatch::try_from_iter(columns)?)
    }

    /// Rebuild a table from its columnar form.
    ///
    /// Only `version` is required; absent key or metric columns read as
    /// missing and `delta_*` columns are ignored. Every other column is a
    /// parameter, kept under its own name and in file order.
    ///
    /// # Errors
    /// Returns [`Error::FieldNotFound`] without a `version` column and
    /// [`Error::Arrow`] if a column cannot be read as text or number
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let versions = text_column(batch, "version")?
            .ok_or_else(|| Error::field_not_found("version"))?;
        let stages = text_column(batch, "stage")?;
        let run_ids = text_column(batch, "run_id")?;

        let missing: Vec<&str> = KEY_COLUMNS
            .into_iter()
            .chain(MetricSet::NAMES)
            .filter(|name| batch.column_by_name(name).is_none())
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "Version table lacks columns; their values read as empty");
        }

        let mut rows: Vec<VersionRecord> = (0..batch.num_rows())
            .map(|i| VersionRecord {
                version: versions[i].clone().unwrap_or_default(),
                stage: stages
                    .as_ref()
                    .and_then(|s| s[i].clone())
                    .unwrap_or_default(),
                run_id: run_ids
                    .as_ref()
                    .and_then(|s| s[i].clone())
                    .unwrap_or_default(),
                ..VersionRecord::default()
            })
            .collect();

        for name in MetricSet::NAMES {
            if let Some(values) = number_column(batch, name)? {
                for (row, value) in rows.iter_mut().zip(values) {
                    row.set_metric(name, value);
                }
            }
        }

        let mut param_columns = Vec::new();
        for field in schema.fields() {
            if is_reserved_column(field.name()) {
                continue;
            }
            let param = param_from_column(field.name());
            if let Some(values) = text_column(batch, field.name())? {
                for (row, value) in rows.iter_mut().zip(values) {
                    if let Some(value) = value {
                        row.params.insert(param.clone(), value);
                    }
                }
            }
            param_columns.push(param);
        }

        Ok(Self {
            rows,
            param_columns,
            deltas: None,
        })
    }

    /// Read a version table file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if unreadable, [`Error::Arrow`] if not CSV,
    /// and [`Error::FieldNotFound`] without a `version` column
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let batch = load_csv(path.as_ref())?;
        debug!(path = %path.as_ref().display(), rows = batch.num_rows(), "Read version table");
        Self::from_record_batch(&batch)
    }

    /// Write the table as CSV, replacing `path` atomically.
    ///
    /// # Errors
    /// Returns [`Error::Io`] or [`Error::Arrow`] on failure
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomic(path, &encode_csv(&self.to_record_batch()?)?)
    }

    /// Render as an aligned text table.
    ///
    /// # Errors
    /// Returns [`Error::Arrow`] if formatting fails
    pub fn render(&self) -> Result<String> {
        Ok(pretty_format_batches(&[self.to_record_batch()?])?.to_string())
    }
}

fn param_union(rows: &[VersionRecord]) -> Vec<String> {
    rows.iter()
        .flat_map(|r| r.params.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn param_column_name(param: &str) -> String {
    if is_reserved_column(param) || param_from_column(param) != param {
        format!("{PARAM_PREFIX}{param}")
    } else {
        param.to_string()
    }
}

/// Inverse of [`param_column_name`]; only clash-escaped names are unwrapped.
fn param_from_column(column: &str) -> String {
    match column.strip_prefix(PARAM_PREFIX) {
        Some(inner) if is_reserved_column(inner) || inner.starts_with(PARAM_PREFIX) => {
            inner.to_string()
        }
        _ => column.to_string(),
    }
}

fn text_column(batch: &RecordBatch, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let column = cast(column, &DataType::Utf8)?;
    let strings = column.as_string::<i32>();
    Ok(Some(
        (0..strings.len())
            .map(|i| (!strings.is_null(i)).then(|| strings.value(i).to_string()))
            .collect(),
    ))
}

fn number_column(batch: &RecordBatch, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let column = cast(column, &DataType::Float64)?;
    Ok(Some(column.as_primitive::<Float64Type>().iter().collect()))
}
