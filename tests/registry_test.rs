//! Model registry integration tests

use ndarray::array;
use serde_json::json;
use trueno_mlops::model::{resolve, Estimator, ModelConfig, ModelKind, Predict, TrainedModel};
use trueno_mlops::Error;

fn config(value: serde_json::Value) -> ModelConfig {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn test_unknown_identifier_fails_before_construction() {
    let err = resolve("unknown-id", ModelConfig::new()).unwrap_err();
    assert!(matches!(err, Error::UnknownModel(_)));
    assert!(err.to_string().contains("unknown-id"));
}

#[test]
fn test_rf_reports_configured_estimators() {
    let spec = resolve("rf", config(json!({"n_estimators": 50}))).unwrap();
    let Estimator::RandomForest(forest) = spec.build().unwrap() else {
        panic!("rf must build a random forest");
    };
    assert_eq!(forest.params().n_estimators, 50);
}

#[test]
fn test_ill_typed_parameter_is_invalid() {
    let spec = resolve("mlp", config(json!({"hidden_layer_sizes": "wide"}))).unwrap();
    let err = spec.build().unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { ref model, .. } if model == "mlp"));
}

#[test]
fn test_out_of_range_parameter_is_invalid() {
    let spec = resolve("rf", config(json!({"n_estimators": 0}))).unwrap();
    assert!(matches!(spec.build(), Err(Error::InvalidParameter { .. })));
}

#[test]
fn test_every_family_fits_and_serializes() {
    let x = array![
        [0.0, 1.0],
        [0.5, 0.8],
        [1.0, 1.2],
        [4.0, 0.9],
        [4.5, 1.1],
        [5.0, 1.0],
    ];
    let y = [0, 0, 0, 1, 1, 1];

    for kind in ModelKind::ALL {
        let mut cfg = ModelConfig::new();
        if kind != ModelKind::LogisticRegression {
            cfg.insert("random_state".to_string(), json!(3));
        }
        let model = resolve(kind.identifier(), cfg)
            .unwrap()
            .build()
            .unwrap()
            .fit(x.view(), &y)
            .unwrap();
        assert_eq!(model.kind(), kind);

        let restored: TrainedModel =
            serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
        assert_eq!(
            restored.predict(x.view()).unwrap(),
            model.predict(x.view()).unwrap()
        );
    }
}

#[test]
fn test_model_artifact_is_tagged_by_family() {
    let x = array![[0.0], [1.0], [2.0], [3.0]];
    let model = resolve("lr", ModelConfig::new())
        .unwrap()
        .build()
        .unwrap()
        .fit(x.view(), &[0, 0, 1, 1])
        .unwrap();
    let value = serde_json::to_value(&model).unwrap();
    assert_eq!(value["model"], "logistic_regression");
    assert!(value.get("state").is_some());
}
