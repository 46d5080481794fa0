//! Wine Quality Pipeline Example
//!
//! Prepares a synthetic wine-quality table, trains three versions of a
//! random forest with growing ensembles, records each run, then prints
//! the version comparison table.
//!
//! Run with: cargo run --example wine_quality

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use trueno_mlops::compare::{compute_deltas, fetch_model_versions};
use trueno_mlops::config::{PipelineParams, TrainConfig};
use trueno_mlops::dataset::Dataset;
use trueno_mlops::experiment::ExperimentStore;
use trueno_mlops::pipeline::run_training;

/// Quality rises with alcohol and falls with volatile acidity, plus noise.
fn raw_wine_table(rows: usize) -> trueno_mlops::Result<Dataset> {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut alcohol = Vec::with_capacity(rows);
    let mut acidity = Vec::with_capacity(rows);
    let mut sulphates = Vec::with_capacity(rows);
    let mut quality = Vec::with_capacity(rows);

    for _ in 0..rows {
        let a: f64 = rng.gen_range(8.5..14.0);
        let v: f64 = rng.gen_range(0.1..1.2);
        let s: f64 = rng.gen_range(0.3..1.5);
        let noise: f64 = rng.gen_range(-0.8..0.8);
        #[allow(clippy::cast_possible_truncation)]
        let q = (0.6f64.mul_add(a, -2.5 * v) + 0.5 * s + noise).round() as i64;
        alcohol.push(a);
        acidity.push(v);
        sulphates.push(s);
        quality.push(q.clamp(3, 9));
    }

    let ids: Vec<i64> = (0..).take(rows).collect();
    Dataset::from_columns(vec![
        ("alcohol", Arc::new(Float64Array::from(alcohol)) as ArrayRef),
        ("volatile_acidity", Arc::new(Float64Array::from(acidity)) as ArrayRef),
        ("sulphates", Arc::new(Float64Array::from(sulphates)) as ArrayRef),
        ("quality", Arc::new(Int64Array::from(quality)) as ArrayRef),
        ("Id", Arc::new(Int64Array::from(ids)) as ArrayRef),
    ])
}

fn main() -> trueno_mlops::Result<()> {
    println!("=== Wine Quality Pipeline ===\n");

    let workdir = tempfile::tempdir()?;

    // -------------------------------------------------------------------------
    // 1. Prepare
    // -------------------------------------------------------------------------
    let processed = raw_wine_table(400)?
        .create_binary_target("quality", 6.0)?
        .remove_fields(&["quality", "Id"])?;
    let data_path = workdir.path().join("processed.parquet");
    processed.write(&data_path)?;
    println!(
        "1. Prepared {} rows with fields {:?}",
        processed.num_rows(),
        processed.field_names()
    );

    // -------------------------------------------------------------------------
    // 2. Train three versions
    // -------------------------------------------------------------------------
    println!("\n2. Training...");
    let mut store = ExperimentStore::new();
    for n_estimators in [5, 25, 100] {
        let mut params = PipelineParams::default();
        params.model.insert(
            "rf".to_string(),
            serde_json::from_value(serde_json::json!({
                "n_estimators": n_estimators,
                "max_depth": 6,
                "random_state": 42,
            }))?,
        );
        let config = TrainConfig::from_params(
            &params,
            &data_path,
            "quality_binary",
            Some("rf"),
            workdir.path().join("models"),
        )?
        .with_run_name(format!("rf_{n_estimators}_trees"));

        let outcome = run_training(&config, &mut store)?;
        println!(
            "   v{} ({n_estimators} trees): {}",
            outcome.recorded.model_version.version(),
            outcome.metrics
        );
    }

    // -------------------------------------------------------------------------
    // 3. Compare
    // -------------------------------------------------------------------------
    println!("\n3. Comparing versions of wq-demo-rf...");
    let table = compute_deltas(fetch_model_versions(&store, "wq-demo-rf")?.rows());
    println!("{}", table.render()?);

    println!("\n=== Done ===");
    Ok(())
}
