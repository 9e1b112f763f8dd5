mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tabpredict::estimator::EstimatorSpec;
use tabpredict::registry::{
    ArtifactFetcher, FetchError, HttpFetcher, ModelDescriptor, ModelRegistry, ModelState,
    PredictionStatus, RegistryError,
};

use common::{machine_artifact, machine_row, spawn_artifact_server, write_machine_artifact};

/// Serves fixed bodies and counts requests. Unknown URLs answer 404.
struct CountingFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn new(bodies: HashMap<String, Vec<u8>>) -> Self {
        Self { bodies, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError { status: Some(404), message: "Not Found".into() })
    }
}

/// Fails with 503 until `failures` requests have been made.
struct FlakyFetcher {
    body: Vec<u8>,
    failures: usize,
    calls: AtomicUsize,
}

impl ArtifactFetcher for FlakyFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(FetchError { status: Some(503), message: "Service Unavailable".into() })
        } else {
            Ok(self.body.clone())
        }
    }
}

fn logistic_bytes() -> Vec<u8> {
    machine_artifact(EstimatorSpec::logistic_regression()).to_bytes().unwrap()
}

#[tokio::test]
async fn three_remote_models_with_one_missing() {
    let dir = tempfile::tempdir().unwrap();
    write_machine_artifact(&dir.path().join("model_1.tabm"), EstimatorSpec::logistic_regression());
    write_machine_artifact(&dir.path().join("model_3.tabm"), EstimatorSpec::gradient_boosting());
    let addr = spawn_artifact_server(dir.path()).await;

    let mut registry = ModelRegistry::new();
    for name in ["model_1", "model_2", "model_3"] {
        let url = format!("http://{}/artifacts/{}.tabm", addr, name);
        registry.register(ModelDescriptor::remote_url(name, url)).unwrap();
    }

    let results = registry.resolve_all(&["model_1", "model_2", "model_3"]).await;
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["model_1", "model_2", "model_3"]);

    assert!(results[0].1.is_ok());
    match &results[1].1 {
        Err(RegistryError::Network { model, status, .. }) => {
            assert_eq!(model, "model_2");
            assert_eq!(*status, Some(404));
        }
        other => panic!("expected a network error, got {:?}", other.as_ref().map(|m| m.name())),
    }
    assert!(results[2].1.is_ok());

    assert_eq!(registry.state("model_1"), Some(ModelState::Resolved));
    assert_eq!(registry.state("model_2"), Some(ModelState::Unresolved));
    assert_eq!(registry.state("model_3"), Some(ModelState::Resolved));
}

#[tokio::test]
async fn machine_row_yields_binary_label_and_confidence() {
    let dir = tempfile::tempdir().unwrap();
    write_machine_artifact(&dir.path().join("rf.tabm"), EstimatorSpec::random_forest());
    let addr = spawn_artifact_server(dir.path()).await;

    let mut registry = ModelRegistry::with_fetcher(HttpFetcher::new());
    registry
        .register(ModelDescriptor::remote_url("Random Forest", format!("http://{}/artifacts/rf.tabm", addr)))
        .unwrap();
    registry
        .register(ModelDescriptor::local_file("Random Forest (local)", dir.path().join("rf.tabm")))
        .unwrap();

    for result in registry.predict_all(&machine_row()).await {
        assert_eq!(result.status, PredictionStatus::Ok, "{}", result.model_name);
        let label = result.predicted_label.unwrap();
        let confidence = result.confidence.unwrap();
        assert!(label == 0 || label == 1);
        assert!((0.0..=1.0).contains(&confidence));
        assert_eq!(result.probabilities.len(), 2);
    }
}

#[tokio::test]
async fn resolve_is_idempotent() {
    let url = "http://artifacts.test/lr.tabm".to_string();
    let fetcher = CountingFetcher::new(HashMap::from([(url.clone(), logistic_bytes())]));
    let mut registry = ModelRegistry::with_fetcher(fetcher);
    registry.register(ModelDescriptor::remote_url("lr", url)).unwrap();

    let first = registry.resolve("lr").await.unwrap();
    let second = registry.resolve("lr").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.fetcher().calls(), 1);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let fetcher = FlakyFetcher { body: logistic_bytes(), failures: 1, calls: AtomicUsize::new(0) };
    let mut registry = ModelRegistry::with_fetcher(fetcher);
    registry.register(ModelDescriptor::remote_url("lr", "http://artifacts.test/lr.tabm")).unwrap();

    let err = registry.resolve("lr").await.unwrap_err();
    assert!(matches!(err, RegistryError::Network { status: Some(503), .. }));
    assert_eq!(registry.state("lr"), Some(ModelState::Unresolved));

    registry.resolve("lr").await.unwrap();
    registry.resolve("lr").await.unwrap();
    assert_eq!(registry.fetcher().calls.load(Ordering::SeqCst), 2);
    assert_eq!(registry.state("lr"), Some(ModelState::Resolved));
}

#[tokio::test]
async fn corrupt_remote_body_is_deserialization_error() {
    let url = "http://artifacts.test/bad.tabm".to_string();
    let fetcher = CountingFetcher::new(HashMap::from([(url.clone(), b"<html>oops</html>".to_vec())]));
    let mut registry = ModelRegistry::with_fetcher(fetcher);
    registry.register(ModelDescriptor::remote_url("bad", url)).unwrap();

    let err = registry.resolve("bad").await.unwrap_err();
    assert!(matches!(err, RegistryError::Deserialization { .. }));
}

#[tokio::test]
async fn missing_local_artifact_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.tabm");
    let mut registry = ModelRegistry::new();
    registry.register(ModelDescriptor::local_file("absent", &path)).unwrap();

    let err = registry.resolve("absent").await.unwrap_err();
    assert_eq!(err, RegistryError::ArtifactNotFound { model: "absent".into(), path: path.clone() });

    // Appears later: the next resolve picks it up.
    write_machine_artifact(&path, EstimatorSpec::logistic_regression());
    assert!(registry.resolve("absent").await.is_ok());
}

#[tokio::test]
async fn corrupt_local_artifact_is_deserialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.tabm");
    std::fs::write(&path, b"TABM\x01\x00\x00\x00garbage").unwrap();

    let mut registry = ModelRegistry::new();
    registry.register(ModelDescriptor::local_file("corrupt", &path)).unwrap();

    let err = registry.resolve("corrupt").await.unwrap_err();
    assert!(matches!(err, RegistryError::Deserialization { ref model, .. } if model == "corrupt"));
}

#[tokio::test]
async fn cached_local_model_survives_file_removal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lr.tabm");
    write_machine_artifact(&path, EstimatorSpec::logistic_regression());

    let mut registry = ModelRegistry::new();
    registry.register(ModelDescriptor::local_file("lr", &path)).unwrap();

    let first = registry.resolve("lr").await.unwrap();
    std::fs::remove_file(&path).unwrap();
    let second = registry.resolve("lr").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let result = registry.predict("lr", &machine_row()).await;
    assert!(result.status.is_ok());
}

#[tokio::test]
async fn missing_column_is_predict_error() {
    let url = "http://artifacts.test/lr.tabm".to_string();
    let fetcher = CountingFetcher::new(HashMap::from([(url.clone(), logistic_bytes())]));
    let mut registry = ModelRegistry::with_fetcher(fetcher);
    registry.register(ModelDescriptor::remote_url("lr", url)).unwrap();

    let mut row = machine_row();
    row.remove("Tool wear [min]");
    let result = registry.predict("lr", &row).await;

    match result.status {
        PredictionStatus::PredictError(RegistryError::SchemaMismatch { missing, unexpected, .. }) => {
            assert_eq!(missing, vec!["Tool wear [min]".to_string()]);
            assert!(unexpected.is_empty());
        }
        other => panic!("expected a schema mismatch, got {:?}", other),
    }
    assert_eq!(result.predicted_label, None);
    // The model itself resolved fine.
    assert_eq!(registry.state("lr"), Some(ModelState::Resolved));
}

#[tokio::test]
async fn one_failure_does_not_affect_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.tabm");
    write_machine_artifact(&good, EstimatorSpec::logistic_regression());

    let mut registry = ModelRegistry::new();
    registry.register(ModelDescriptor::local_file("good", &good)).unwrap();
    registry
        .register(ModelDescriptor::local_file("gone", dir.path().join("gone.tabm")))
        .unwrap();
    registry
        .register(ModelDescriptor::in_memory("unfit", EstimatorSpec::random_forest()))
        .unwrap();

    let results = registry.predict_all(&machine_row()).await;
    let names: Vec<&str> = results.iter().map(|r| r.model_name.as_str()).collect();
    assert_eq!(names, vec!["good", "gone", "unfit"]);

    assert!(results[0].status.is_ok());
    assert!(matches!(
        results[1].status,
        PredictionStatus::LoadError(RegistryError::ArtifactNotFound { .. })
    ));
    assert!(matches!(results[2].status, PredictionStatus::LoadError(RegistryError::Fit { .. })));

    let resolved = registry.resolve_all(&["good", "nope"]).await;
    assert!(resolved[0].1.is_ok());
    assert_eq!(resolved[1].1.as_ref().unwrap_err(), &RegistryError::UnknownModel("nope".into()));
}
