//! Error types for trueno-mlops
//!
//! Every variant aborts the current run: a model or metric set produced from
//! malformed input would corrupt later version comparisons.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trueno-mlops error types
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced column is absent from the dataset
    #[error("Field not found: `{field}`")]
    FieldNotFound {
        /// Name of the missing column
        field: String,
    },

    /// Model identifier is not in the registry
    #[error("Unknown model: `{0}` (known models: rf, lr, mlp)")]
    UnknownModel(String),

    /// A classifier rejected its configuration
    #[error("Invalid parameter for model `{model}`: {reason}")]
    InvalidParameter {
        /// Model identifier
        model: String,
        /// What the variant rejected
        reason: String,
    },

    /// Dataset does not have the shape training requires
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Tracking backend unreachable or rejected a write
    #[error("Experiment store error: {0}")]
    ExternalStore(String),

    /// Parameter file unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error (CSV reader/writer, casts)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::FieldNotFound`].
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }
}
