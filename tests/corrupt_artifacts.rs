mod common;

use serde_json::Value;

use tabpredict::artifact::{ArtifactError, ModelArtifact};
use tabpredict::estimator::{Estimator, EstimatorSpec};
use tabpredict::registry::{ModelDescriptor, ModelRegistry, ModelState, PredictionStatus, RegistryError};

use common::{machine_artifact, machine_row};

/// Re-encodes a fitted machine artifact after `edit` rewrites its JSON payload.
fn edited_artifact_bytes(spec: EstimatorSpec, edit: impl FnOnce(&mut Value)) -> Vec<u8> {
    let artifact = machine_artifact(spec);
    let mut payload = serde_json::to_value(&artifact.estimator).unwrap();
    edit(&mut payload);
    let estimator: Estimator = serde_json::from_value(payload).unwrap();
    ModelArtifact { estimator, ..artifact }.to_bytes().unwrap()
}

/// Registers the bytes as a local file and checks that resolution fails with
/// a deserialization error and prediction reports a load error.
async fn assert_rejected(bytes: Vec<u8>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.tabm");
    std::fs::write(&path, bytes).unwrap();

    let mut registry = ModelRegistry::new();
    registry.register(ModelDescriptor::local_file("corrupt", &path)).unwrap();

    let err = registry.resolve("corrupt").await.unwrap_err();
    assert!(matches!(err, RegistryError::Deserialization { .. }), "got {:?}", err);
    assert_eq!(registry.state("corrupt"), Some(ModelState::Unresolved));

    let result = registry.predict("corrupt", &machine_row()).await;
    assert!(matches!(result.status, PredictionStatus::LoadError(_)));
    assert_eq!(result.confidence, None);
}

#[tokio::test]
async fn forest_without_trees_is_rejected() {
    let bytes = edited_artifact_bytes(EstimatorSpec::random_forest(), |payload| {
        payload["trees"] = Value::Array(Vec::new());
    });
    assert_rejected(bytes).await;
}

#[tokio::test]
async fn logistic_without_weights_is_rejected() {
    let bytes = edited_artifact_bytes(EstimatorSpec::logistic_regression(), |payload| {
        payload["weights"] = Value::Array(Vec::new());
    });
    assert_rejected(bytes).await;
}

#[tokio::test]
async fn boosting_split_on_unknown_feature_is_rejected() {
    let bytes = edited_artifact_bytes(EstimatorSpec::gradient_boosting(), |payload| {
        let split = payload["trees"]
            .as_array_mut()
            .unwrap()
            .iter_mut()
            .flat_map(|tree| tree["nodes"].as_array_mut().unwrap().iter_mut())
            .find_map(|node| node.get_mut("Split"))
            .expect("a fitted booster has at least one split");
        split["feature"] = Value::from(99);
    });
    assert_rejected(bytes).await;
}

#[test]
fn forest_leaf_of_wrong_width_is_invalid_format() {
    let bytes = edited_artifact_bytes(EstimatorSpec::random_forest(), |payload| {
        let leaf = payload["trees"][0]["nodes"]
            .as_array_mut()
            .unwrap()
            .iter_mut()
            .find_map(|node| node.get_mut("Leaf"))
            .unwrap();
        leaf["value"] = Value::from(vec![1.0]);
    });
    let err = ModelArtifact::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, ArtifactError::InvalidFormat(_)), "got {:?}", err);
}

#[test]
fn untouched_payload_still_decodes() {
    for spec in [
        EstimatorSpec::logistic_regression(),
        EstimatorSpec::random_forest(),
        EstimatorSpec::gradient_boosting(),
    ] {
        let bytes = edited_artifact_bytes(spec, |_| {});
        assert!(ModelArtifact::from_bytes(&bytes).is_ok());
    }
}
