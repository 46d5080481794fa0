//! Command-line interface for `trueno-mlops`
//!
//! ```bash
//! trueno-mlops prepare --input data/raw/winequality-red.csv --output data/processed/wine.csv
//! trueno-mlops train --data data/processed/wine.csv --model rf
//! trueno-mlops fetch-versions --lineage wq-demo-rf
//! trueno-mlops compare --versions model_versions.csv
//! ```

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::init_logging;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// trueno-mlops: tabular classification with tracked, comparable runs
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "trueno-mlops")]
#[command(author = "Pragmatic AI Labs")]
#[command(version)]
#[command(about = "Prepare data, train tracked classifiers and compare model versions")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Debug-level logging (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Derive a binary label and drop unused columns
    Prepare(PrepareArgs),

    /// Train, evaluate and record one model
    Train(TrainArgs),

    /// Export the registered versions of a lineage
    FetchVersions(FetchVersionsArgs),

    /// Print per-version metric deltas
    Compare(CompareArgs),
}

/// Arguments for `prepare`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PrepareArgs {
    /// Raw dataset (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the prepared dataset
    #[arg(short, long)]
    pub output: PathBuf,

    /// Continuous column the label is derived from
    #[arg(long, default_value = "quality")]
    pub target: String,

    /// Values strictly above this become label 1
    #[arg(long, default_value_t = 6.0)]
    pub threshold: f64,

    /// Columns to drop after labeling (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "quality,Id")]
    pub drop: Vec<String>,
}

/// Arguments for `train`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Prepared dataset
    #[arg(short, long)]
    pub data: PathBuf,

    /// Label column
    #[arg(long, default_value = "quality_binary")]
    pub target: String,

    /// Model identifier (rf, lr, mlp); defaults to `train.model_name`
    #[arg(short, long)]
    pub model: Option<String>,

    /// Directory for model and metrics artifacts
    #[arg(short, long, default_value = "models")]
    pub output_dir: PathBuf,

    /// Parameter file; `params.yaml` is used when present
    #[arg(short, long)]
    pub params: Option<PathBuf>,

    /// Tracking store directory
    #[arg(long, default_value = "mlruns")]
    pub tracking_dir: PathBuf,

    /// Experiment name
    #[arg(long)]
    pub experiment: Option<String>,

    /// Run name (default `{model}_run`)
    #[arg(long)]
    pub run_name: Option<String>,

    /// Lineage to register under (default `wq-demo-{model}`)
    #[arg(long)]
    pub lineage: Option<String>,
}

/// Arguments for `fetch-versions`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct FetchVersionsArgs {
    /// Lineage to export
    #[arg(short, long, default_value = "wq-demo-rf")]
    pub lineage: String,

    /// Tracking store directory
    #[arg(long, default_value = "mlruns")]
    pub tracking_dir: PathBuf,

    /// Version table file to write
    #[arg(short, long, default_value = "model_versions.csv")]
    pub output: PathBuf,
}

/// Arguments for `compare`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct CompareArgs {
    /// Version table file to read
    #[arg(long, default_value = "model_versions.csv")]
    pub versions: PathBuf,

    /// Also write the table with deltas here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Parse arguments without exiting the process.
///
/// # Errors
/// Returns the clap error for invalid arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_defaults() {
        let cli = parse_args(["trueno-mlops", "prepare", "-i", "raw.csv", "-o", "out.csv"]).unwrap();
        match cli.command {
            Command::Prepare(args) => {
                assert_eq!(args.target, "quality");
                assert!((args.threshold - 6.0).abs() < f64::EPSILON);
                assert_eq!(args.drop, vec!["quality", "Id"]);
            }
            other => panic!("expected prepare, got {other:?}"),
        }
    }

    #[test]
    fn test_train_arguments() {
        let cli = parse_args([
            "trueno-mlops",
            "train",
            "--data",
            "wine.csv",
            "--model",
            "mlp",
            "--tracking-dir",
            "runs",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.model.as_deref(), Some("mlp"));
                assert_eq!(args.target, "quality_binary");
                assert_eq!(args.output_dir, PathBuf::from("models"));
                assert_eq!(args.tracking_dir, PathBuf::from("runs"));
            }
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_fetch_versions_defaults() {
        let cli = parse_args(["trueno-mlops", "fetch-versions"]).unwrap();
        assert_eq!(
            cli.command,
            Command::FetchVersions(FetchVersionsArgs {
                lineage: "wq-demo-rf".to_string(),
                tracking_dir: PathBuf::from("mlruns"),
                output: PathBuf::from("model_versions.csv"),
            })
        );
    }

    #[test]
    fn test_train_requires_data() {
        assert!(parse_args(["trueno-mlops", "train"]).is_err());
    }
}
