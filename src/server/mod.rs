mod routes;
mod server;
mod types;

// Re-export from server
pub use server::{ArtifactServer, ArtifactStore};
// Re-export from types
pub use types::{ApiResponse, ArtifactInfo};
