use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path as UrlPath, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{info, warn, error};

use crate::artifact::{ModelArtifact, ARTIFACT_EXTENSION};
use super::server::ArtifactStore;
use super::types::{ApiResponse, ArtifactInfo};

/// Returns a health check response
pub async fn health_check() -> &'static str {
    info!("Health check endpoint called");
    "tabpredict artifact server is running"
}

/// Lists the artifact files in the served directory, sorted by name.
pub async fn list_artifacts(State(store): State<Arc<ArtifactStore>>) -> impl IntoResponse {
    match scan_directory(&store.directory) {
        Ok(artifacts) => {
            info!("Listing {} artifacts", artifacts.len());
            (StatusCode::OK, Json(ApiResponse::success(artifacts)))
        }
        Err(e) => {
            error!("Failed to read artifact directory {}: {}", store.directory.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<ArtifactInfo>>::error(format!(
                    "Failed to read artifact directory: {}",
                    e
                ))),
            )
        }
    }
}

/// Serves the raw bytes of one artifact file.
pub async fn get_artifact(
    State(store): State<Arc<ArtifactStore>>,
    UrlPath(file): UrlPath<String>,
) -> Response {
    if !is_plain_file_name(&file) {
        warn!("Rejected artifact request for '{}'", file);
        return (StatusCode::BAD_REQUEST, "invalid artifact name").into_response();
    }

    let path = store.directory.join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            info!("Serving {} ({} bytes)", file, bytes.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/octet-stream")],
                Bytes::from(bytes),
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Artifact '{}' not found", file);
            (StatusCode::NOT_FOUND, "artifact not found").into_response()
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read artifact").into_response()
        }
    }
}

/// A single path component: no separators, no `..`, not hidden.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != ".."
}

fn scan_directory(directory: &Path) -> std::io::Result<Vec<ArtifactInfo>> {
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        let is_artifact = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(ARTIFACT_EXTENSION));
        if !is_artifact {
            continue;
        }

        let file = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let size = std::fs::metadata(&path)?.len();
        let header = ModelArtifact::read(&path)
            .map_err(|e| warn!("Skipping header of {}: {}", file, e))
            .ok();

        artifacts.push(ArtifactInfo {
            file,
            size,
            kind: header.as_ref().map(|a| a.kind.clone()),
            feature_names: header.as_ref().map(|a| a.feature_names.clone()),
            trained_at: header.as_ref().map(|a| a.trained_at.to_rfc3339()),
        });
    }
    artifacts.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(artifacts)
}
