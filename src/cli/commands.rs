//! Command handlers

use super::{Cli, Command, CompareArgs, FetchVersionsArgs, PrepareArgs, TrainArgs};
use crate::compare::{fetch_model_versions, VersionTable};
use crate::config::{PipelineParams, TrainConfig};
use crate::dataset::Dataset;
use crate::experiment::FileTrackingStore;
use crate::pipeline::run_training;
use anyhow::Context;
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_PARAMS: &str = "params.yaml";

/// Execute a parsed command line.
///
/// # Errors
/// Returns the first failure with the failing step as context
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Prepare(args) => prepare(&args),
        Command::Train(args) => train(&args),
        Command::FetchVersions(args) => fetch_versions(&args),
        Command::Compare(args) => compare(&args),
    }
}

fn prepare(args: &PrepareArgs) -> anyhow::Result<()> {
    let raw = Dataset::read(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    info!(rows = raw.num_rows(), columns = raw.num_columns(), "Loaded raw data");

    let prepared = raw
        .create_binary_target(&args.target, args.threshold)?
        .remove_fields(&args.drop)?;
    prepared
        .write(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "Prepared {} rows x {} columns -> {}",
        prepared.num_rows(),
        prepared.num_columns(),
        args.output.display()
    );
    Ok(())
}

fn load_params(explicit: Option<&Path>) -> anyhow::Result<PipelineParams> {
    match explicit {
        Some(path) => Ok(PipelineParams::load(path)?),
        None if Path::new(DEFAULT_PARAMS).exists() => Ok(PipelineParams::load(DEFAULT_PARAMS)?),
        None => {
            warn!("No {DEFAULT_PARAMS} found; using built-in defaults");
            Ok(PipelineParams::default())
        }
    }
}

fn train(args: &TrainArgs) -> anyhow::Result<()> {
    let params = load_params(args.params.as_deref())?;
    let mut config = TrainConfig::from_params(
        &params,
        &args.data,
        &args.target,
        args.model.as_deref(),
        &args.output_dir,
    )?;
    if let Some(experiment) = &args.experiment {
        config = config.with_experiment(experiment);
    }
    if let Some(run_name) = &args.run_name {
        config = config.with_run_name(run_name);
    }
    if let Some(lineage) = &args.lineage {
        config = config.with_lineage(lineage);
    }

    let mut store = FileTrackingStore::open(&args.tracking_dir)?;
    let outcome = run_training(&config, &mut store)?;

    println!("{}", outcome.metrics);
    println!(
        "Registered {} version {} (run {})",
        config.lineage,
        outcome.recorded.model_version.version(),
        outcome.recorded.run_id
    );
    Ok(())
}

fn fetch_versions(args: &FetchVersionsArgs) -> anyhow::Result<()> {
    let store = FileTrackingStore::open(&args.tracking_dir)?;
    let table = fetch_model_versions(&store, &args.lineage)?;
    if table.is_empty() {
        warn!(lineage = %args.lineage, "No registered versions");
    }
    table
        .write_csv(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "Wrote {} versions of {} -> {}",
        table.len(),
        args.lineage,
        args.output.display()
    );
    Ok(())
}

fn compare(args: &CompareArgs) -> anyhow::Result<()> {
    let versions = VersionTable::read_csv(&args.versions)
        .with_context(|| format!("reading {}", args.versions.display()))?;
    let table = versions.with_version_deltas();
    println!("{}", table.render()?);
    if let Some(output) = &args.output {
        table
            .write_csv(output)
            .with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(())
}
