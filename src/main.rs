//! trueno-mlops CLI
//!
//! # Usage
//!
//! ```bash
//! # Label and clean the raw wine data
//! trueno-mlops prepare --input data/raw/winequality-red.csv --output data/processed/wine.csv
//!
//! # Train and record a random forest
//! trueno-mlops train --data data/processed/wine.csv --model rf
//!
//! # Export versions, then show metric deltas
//! trueno-mlops fetch-versions --lineage wq-demo-rf
//! trueno-mlops compare --versions model_versions.csv
//! ```

use clap::Parser;
use std::process::ExitCode;
use trueno_mlops::cli::{init_logging, run_command, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
