//! Training pipeline benchmarks
//!
//! Benchmarks for the trainer and evaluator:
//! - Seeded train/test split
//! - Fit and score per model family
//! - Version delta computation
//!
//! Measure before optimizing.

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use trueno_mlops::compare::{compute_deltas, VersionRecord};
use trueno_mlops::dataset::Dataset;
use trueno_mlops::model::{ModelConfig, ModelKind, ModelSpec};
use trueno_mlops::train::{split, train_and_evaluate, SplitConfig};

/// Create a labeled dataset with four features and a noisy linear boundary
#[allow(clippy::cast_precision_loss)]
fn create_labeled_dataset(num_rows: usize) -> Dataset {
    let a: Vec<f64> = (0..num_rows).map(|i| (i % 97) as f64 * 0.1).collect();
    let b: Vec<f64> = (0..num_rows).map(|i| ((i * 31) % 53) as f64 * 0.2).collect();
    let c: Vec<f64> = (0..num_rows).map(|i| (i as f64).sin()).collect();
    let d: Vec<f64> = (0..num_rows).map(|i| ((i * 7) % 11) as f64).collect();
    let y: Vec<i64> = a
        .iter()
        .zip(&b)
        .zip(&c)
        .map(|((a, b), c)| i64::from(a + 0.5 * b + c > 7.0))
        .collect();

    Dataset::from_columns(vec![
        ("a", Arc::new(Float64Array::from(a)) as ArrayRef),
        ("b", Arc::new(Float64Array::from(b)) as ArrayRef),
        ("c", Arc::new(Float64Array::from(c)) as ArrayRef),
        ("d", Arc::new(Float64Array::from(d)) as ArrayRef),
        ("label", Arc::new(Int64Array::from(y)) as ArrayRef),
    ])
    .expect("valid benchmark dataset")
}

/// Small, fixed-seed configuration per family
fn bench_spec(kind: ModelKind) -> ModelSpec {
    let config = match kind {
        ModelKind::RandomForest => json!({"n_estimators": 20, "random_state": 7}),
        ModelKind::LogisticRegression => json!({"max_iter": 200}),
        ModelKind::Mlp => json!({"hidden_layer_sizes": [16], "max_iter": 50, "random_state": 7}),
    };
    let serde_json::Value::Object(map) = config else {
        return ModelSpec::resolve(kind.identifier(), ModelConfig::new()).expect("known model");
    };
    ModelSpec::resolve(kind.identifier(), map).expect("known model")
}

/// Benchmark: seeded split
fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    for size in &[1_000, 10_000, 100_000] {
        let data = create_labeled_dataset(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let split = split(black_box(&data), "label", 0.2, 42).expect("split");
                black_box(split.test_rows.len());
            });
        });
    }

    group.finish();
}

/// Benchmark: train and evaluate each model family
fn bench_train_and_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_and_evaluate");
    group.sample_size(10);

    let data = create_labeled_dataset(2_000);
    let config = SplitConfig::default();

    for kind in ModelKind::ALL {
        let spec = bench_spec(kind);
        group.bench_with_input(
            BenchmarkId::from_parameter(kind.identifier()),
            &spec,
            |b, spec| {
                b.iter(|| {
                    let (_, metrics) =
                        train_and_evaluate(black_box(&data), "label", spec, &config).expect("train");
                    black_box(metrics.f1);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: delta table over growing version histories
#[allow(clippy::cast_precision_loss)]
fn bench_compute_deltas(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_deltas");

    for count in &[10, 100, 1_000] {
        let records: Vec<VersionRecord> = (1..=*count)
            .rev()
            .map(|v| VersionRecord {
                version: v.to_string(),
                accuracy: Some((v % 13) as f64 / 13.0),
                f1: Some((v % 7) as f64 / 7.0),
                ..VersionRecord::default()
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| black_box(compute_deltas(black_box(records)).len()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_split,
    bench_train_and_evaluate,
    bench_compute_deltas
);
criterion_main!(benches);
