use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::routes;

/// Shared state of the artifact routes
pub struct ArtifactStore {
    /// Directory whose `.tabm` files are served
    pub directory: PathBuf,
}

/// HTTP host for model artifacts, the other end of `remote_url` models
pub struct ArtifactServer {
    store: Arc<ArtifactStore>,
    host: String,
    port: u16,
}

impl ArtifactServer {
    pub fn new(directory: PathBuf, host: String, port: u16) -> Self {
        if !directory.is_dir() {
            warn!("Artifact directory {} does not exist yet", directory.display());
        }
        info!("Creating artifact server for {} on {}:{}", directory.display(), host, port);
        Self {
            store: Arc::new(ArtifactStore { directory }),
            host,
            port,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::health_check))
            .route("/api/v1/artifacts", get(routes::list_artifacts))
            .route("/artifacts/{file}", get(routes::get_artifact))
            .with_state(Arc::clone(&self.store))
    }

    /// Binds `host:port` and serves until the process stops.
    pub async fn start(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!("Starting server on {}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve_on(&self, listener: TcpListener) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!("Server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
