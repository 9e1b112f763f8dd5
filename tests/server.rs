mod common;

use tabpredict::artifact::ModelArtifact;
use tabpredict::estimator::EstimatorSpec;
use tabpredict::server::{ApiResponse, ArtifactInfo};

use common::{spawn_artifact_server, write_machine_artifact};

#[tokio::test]
async fn health_check_answers() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_artifact_server(dir.path()).await;

    let body = reqwest::get(format!("http://{}/", addr)).await.unwrap().text().await.unwrap();
    assert!(body.contains("running"));
}

#[tokio::test]
async fn lists_only_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    write_machine_artifact(&dir.path().join("lr.tabm"), EstimatorSpec::logistic_regression());
    std::fs::write(dir.path().join("notes.txt"), "not a model").unwrap();
    let addr = spawn_artifact_server(dir.path()).await;

    let response: ApiResponse<Vec<ArtifactInfo>> = reqwest::get(format!("http://{}/api/v1/artifacts", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response.status, "success");
    let artifacts = response.data.unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].file, "lr.tabm");
    assert_eq!(artifacts[0].kind.as_deref(), Some("logistic_regression"));
    assert_eq!(artifacts[0].feature_names.as_ref().map(Vec::len), Some(5));
}

#[tokio::test]
async fn serves_artifact_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gb.tabm");
    write_machine_artifact(&path, EstimatorSpec::gradient_boosting());
    let addr = spawn_artifact_server(dir.path()).await;

    let response = reqwest::get(format!("http://{}/artifacts/gb.tabm", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    let bytes = response.bytes().await.unwrap();
    assert_eq!(bytes.as_ref(), std::fs::read(&path).unwrap().as_slice());
    assert_eq!(ModelArtifact::from_bytes(&bytes).unwrap().kind, "gradient_boosting");
}

#[tokio::test]
async fn missing_artifact_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_artifact_server(dir.path()).await;

    let response = reqwest::get(format!("http://{}/artifacts/nope.tabm", addr)).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_artifact_server(dir.path()).await;

    let response = reqwest::get(format!("http://{}/artifacts/..%2Fsecret.tabm", addr)).await.unwrap();
    assert_eq!(response.status(), 400);
}
