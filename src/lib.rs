//! # Trueno-MLOps: Reproducible Tabular Classification Runs
//!
//! **Version**: 0.1.0
//!
//! Trueno-MLOps turns a tabular dataset into a labeled training set, fits one
//! of several interchangeable classifiers, evaluates it on a seeded held-out
//! split, and records every run so model versions can be compared later.
//!
//! ## Pipeline
//!
//! ```text
//! raw CSV ──> dataset (label + drop) ──> train (split, fit, score)
//!                                            │
//!                      experiment (params, metrics, model version)
//!                                            │
//!                      compare (per-version metric deltas)
//! ```
//!
//! ## Design Principles
//!
//! - **Reproducible**: splits and seeded models are bit-identical per seed
//! - **Fail fast**: unknown models and malformed data abort before any
//!   artifact is written
//! - **Columnar I/O**: datasets and version tables are Arrow record batches
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_mlops::dataset::Dataset;
//! use trueno_mlops::model::{ModelConfig, ModelSpec};
//! use trueno_mlops::train::{train_and_evaluate, SplitConfig};
//!
//! let data = Dataset::read("data/raw/winequality-red.csv")?
//!     .create_binary_target("quality", 6.0)?
//!     .remove_fields(&["quality", "Id"])?;
//!
//! let spec = ModelSpec::resolve("rf", ModelConfig::new())?;
//! let (_model, metrics) =
//!     train_and_evaluate(&data, "quality_binary", &spec, &SplitConfig::default())?;
//! println!("{metrics}");
//! # Ok::<(), trueno_mlops::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod model;
pub mod pipeline;
pub mod storage;
pub mod train;

pub use error::{Error, Result};
