//! Dataset preparation: binary label derivation and column pruning
//!
//! A [`Dataset`] wraps a single Arrow `RecordBatch`. Every operation returns a
//! new dataset; the input is never modified.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Float64Array, Int64Array};
//! use trueno_mlops::dataset::Dataset;
//!
//! let raw = Dataset::from_columns(vec![
//!     ("alcohol", Arc::new(Float64Array::from(vec![9.4, 12.8])) as ArrayRef),
//!     ("quality", Arc::new(Int64Array::from(vec![5, 7])) as ArrayRef),
//! ])?;
//!
//! let labeled = raw.create_binary_target("quality", 6.0)?;
//! let prepared = labeled.remove_fields(&["quality"])?;
//!
//! assert_eq!(prepared.field_names(), vec!["alcohol", "quality_binary"]);
//! # Ok::<(), trueno_mlops::Error>(())
//! ```

use crate::storage;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the label column derived from `source_field`.
#[must_use]
pub fn binary_target_name(source_field: &str) -> String {
    format!("{source_field}_binary")
}

/// Rectangular table of records with a fixed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// Wrap an existing record batch.
    #[must_use]
    pub const fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a dataset from named columns of equal length.
    ///
    /// # Errors
    /// Returns error if the columns differ in length
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: AsRef<str>,
    {
        let batch = RecordBatch::try_from_iter(columns)?;
        Ok(Self { batch })
    }

    /// Load a dataset from CSV or Parquet (by extension).
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!(path = %path.as_ref().display(), "Loading dataset");
        let batch = storage::load(path)?;
        debug!(rows = batch.num_rows(), columns = batch.num_columns(), "Dataset loaded");
        Ok(Self { batch })
    }

    /// Persist the dataset as CSV or Parquet (by extension).
    ///
    /// # Errors
    /// Returns error if encoding or writing fails
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        storage::save(path.as_ref(), &self.batch)?;
        info!(path = %path.as_ref().display(), rows = self.num_rows(), "Dataset written");
        Ok(())
    }

    /// Underlying record batch.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Unwrap into the underlying record batch.
    #[must_use]
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Number of records.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of fields.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Field names in schema order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Whether the schema has a field called `name`.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.batch.schema_ref().index_of(name).is_ok()
    }

    /// Column by name.
    ///
    /// # Errors
    /// Returns [`Error::FieldNotFound`] if the column is absent
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| Error::field_not_found(name))
    }

    /// Column values widened to `f64`; nulls stay `None`.
    ///
    /// # Errors
    /// Returns [`Error::FieldNotFound`] if the column is absent, or
    /// [`Error::DataShape`] if it is not numeric
    pub fn column_f64(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.column(name)?;
        if !is_numeric(column.data_type()) {
            return Err(Error::DataShape(format!(
                "column `{name}` has non-numeric type {}",
                column.data_type()
            )));
        }
        let widened = cast(column, &DataType::Float64)?;
        Ok(widened.as_primitive::<Float64Type>().iter().collect())
    }

    /// Add a binary label column `{source_field}_binary`.
    ///
    /// The label is 1 where `source_field > threshold` and 0 otherwise;
    /// null source values compare as not greater and yield 0. An existing
    /// label column of the same name is replaced.
    ///
    /// # Errors
    /// Returns [`Error::FieldNotFound`] if `source_field` is absent, or
    /// [`Error::DataShape`] if it is not numeric
    pub fn create_binary_target(&self, source_field: &str, threshold: f64) -> Result<Self> {
        let values = self.column_f64(source_field)?;
        let labels: Int64Array = values
            .iter()
            .map(|v| i64::from(v.is_some_and(|v| v > threshold)))
            .collect::<Vec<_>>()
            .into();

        let positives = labels.values().iter().filter(|&&l| l == 1).count();
        let label_name = binary_target_name(source_field);
        let labeled = self.with_column(&label_name, Arc::new(labels))?;

        info!(
            label = %label_name,
            threshold,
            positives,
            negatives = self.num_rows() - positives,
            "Created binary target"
        );
        Ok(labeled)
    }

    /// Drop the named fields.
    ///
    /// All names are checked before anything is removed; an empty list
    /// returns an identical dataset.
    ///
    /// # Errors
    /// Returns [`Error::FieldNotFound`] for the first name not in the schema
    pub fn remove_fields<S: AsRef<str>>(&self, field_names: &[S]) -> Result<Self> {
        let schema = self.batch.schema_ref();
        let mut drop = Vec::with_capacity(field_names.len());
        for name in field_names {
            let index = schema
                .index_of(name.as_ref())
                .map_err(|_| Error::field_not_found(name.as_ref()))?;
            drop.push(index);
        }

        let keep: Vec<usize> = (0..schema.fields().len())
            .filter(|i| !drop.contains(i))
            .collect();
        let batch = self.batch.project(&keep)?;

        let removed: Vec<&str> = field_names.iter().map(AsRef::as_ref).collect();
        info!(?removed, "Removed fields");
        Ok(Self { batch })
    }

    /// Append (or replace) a column.
    fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        let schema = self.batch.schema_ref();
        let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + 1);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 1);

        for (field, column) in schema.fields().iter().zip(self.batch.columns()) {
            if field.name() != name {
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }
        fields.push(Field::new(name, array.data_type().clone(), array.null_count() > 0));
        columns.push(array);

        let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
        let batch = RecordBatch::try_new(Arc::new(schema), columns)?;
        Ok(Self { batch })
    }
}

impl From<RecordBatch> for Dataset {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

/// Types that widen losslessly enough to `f64` for training.
pub(crate) fn is_numeric(data_type: &DataType) -> bool {
    data_type.is_numeric() || matches!(data_type, DataType::Boolean)
}
