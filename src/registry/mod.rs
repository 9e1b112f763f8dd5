//! # Model Registry
//!
//! Maps model names to descriptors and resolves them on first use: fitting an
//! in-memory estimator, reading a local artifact, or fetching one over HTTP.
//! Resolved models are cached per registry instance; failures are reported
//! per model and never stop the other models.

mod fetch;
mod registry;
mod resolved;
mod types;

// Re-export from types
pub use types::{
    ModelDescriptor, ModelSource, ModelState, PredictionResult, PredictionStatus, RegistryError,
};
// Re-export from registry
pub use registry::ModelRegistry;
// Re-export from resolved
pub use resolved::{ModelOrigin, ResolvedModel};
// Re-export from fetch
pub use fetch::{ArtifactFetcher, FetchError, HttpFetcher};
