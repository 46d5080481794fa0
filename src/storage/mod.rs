//! File storage for datasets and run artifacts (Arrow CSV/Parquet)
//!
//! **Write-Once Design**:
//! - Datasets are immutable once persisted; a write replaces the whole file
//! - Every write lands in a sibling temporary file that is renamed into place,
//!   so a failed run never leaves a half-written artifact behind
//! - Readers materialize the file into a single `RecordBatch`

use crate::{Error, Result};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated text with a header row
    Csv,
    /// Apache Parquet
    Parquet,
}

impl FileFormat {
    /// Pick the format for a path: `.parquet`/`.pq` is Parquet, anything else CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") || ext.eq_ignore_ascii_case("pq") => {
                Self::Parquet
            }
            _ => Self::Csv,
        }
    }
}

/// Load a table from a CSV file with a header row.
///
/// Column types are inferred by Arrow from the full file.
///
/// # Errors
/// Returns error if the file cannot be opened or parsed
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let mut file = File::open(path.as_ref()).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open CSV file {}: {e}", path.as_ref().display()),
        ))
    })?;

    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Load a table from a Parquet file.
///
/// # Errors
/// Returns error if file cannot be read or parsed
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path.as_ref())?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build()?;

    // Read all batches into memory
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }

    Ok(concat_batches(&schema, &batches)?)
}

/// Load a table, choosing the reader by extension.
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn load<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    match FileFormat::from_path(path.as_ref()) {
        FileFormat::Csv => load_csv(path),
        FileFormat::Parquet => load_parquet(path),
    }
}

/// Encode a table as CSV bytes (header row included).
///
/// # Errors
/// Returns error if a column type has no CSV representation
pub fn encode_csv(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        writer.write(batch)?;
    }
    Ok(buf)
}

/// Encode a table as Parquet bytes.
///
/// # Errors
/// Returns error if the Parquet writer rejects the schema
pub fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    use parquet::arrow::ArrowWriter;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

/// Persist a table, choosing the encoder by extension.
///
/// # Errors
/// Returns error if encoding or the atomic write fails
pub fn save<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    let bytes = match FileFormat::from_path(path.as_ref()) {
        FileFormat::Csv => encode_csv(batch)?,
        FileFormat::Parquet => encode_parquet(batch)?,
    };
    write_atomic(path, &bytes)
}

/// Write `bytes` to `path` via a sibling temporary file and a rename.
///
/// Missing parent directories are created.
///
/// # Errors
/// Returns error if the directory, temporary file or rename fails
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(result?)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    #[allow(clippy::cast_precision_loss)]
    fn create_test_batch(num_rows: usize) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("value", DataType::Float64, false),
            Field::new("name", DataType::Utf8, false),
        ]);

        let id_array = Int64Array::from_iter_values(0..num_rows as i64);
        let value_array = Float64Array::from_iter_values((0..num_rows).map(|i| i as f64 + 0.5));
        let name_array = StringArray::from_iter_values((0..num_rows).map(|i| format!("name_{i}")));

        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(id_array),
                Arc::new(value_array),
                Arc::new(name_array),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.csv")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("a/b.parquet")), FileFormat::Parquet);
        assert_eq!(FileFormat::from_path(Path::new("a/b.PQ")), FileFormat::Parquet);
        assert_eq!(FileFormat::from_path(Path::new("noext")), FileFormat::Csv);
    }

    #[test]
    fn test_csv_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let batch = create_test_batch(25);

        save(&path, &batch).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.num_rows(), 25);
        assert_eq!(loaded.num_columns(), 3);
        assert_eq!(loaded.schema().field(0).data_type(), &DataType::Int64);
        assert_eq!(loaded.schema().field(1).data_type(), &DataType::Float64);
        assert_eq!(loaded.schema().field(2).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_parquet_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let batch = create_test_batch(40);

        save(&path, &batch).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.num_rows(), 40);
        assert_eq!(loaded.columns(), batch.columns());
    }

    #[test]
    fn test_csv_header_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "a,b\n").unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.num_rows(), 0);
        assert_eq!(loaded.num_columns(), 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_csv("/nonexistent/definitely/missing.csv");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_write_atomic_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
    }
}
