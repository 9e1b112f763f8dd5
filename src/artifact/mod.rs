mod artifact;
mod artifact_utils;
mod types;

// Re-export from types
pub use types::ArtifactError;
// Re-export from artifact
pub use artifact::{ModelArtifact, ARTIFACT_VERSION};
// Re-export from artifact_utils
pub use artifact_utils::{is_artifact_file, ARTIFACT_EXTENSION, ARTIFACT_MAGIC};
