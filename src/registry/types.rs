use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::estimator::EstimatorSpec;

/// Where a model comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSource {
    /// Fit in-process on the registry's training split
    InMemory { estimator: EstimatorSpec },
    /// A serialized artifact on the local filesystem. `estimator` tells
    /// `train` how to produce the file; resolution never fits.
    LocalFile {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimator: Option<EstimatorSpec>,
    },
    /// A serialized artifact behind an HTTP URL
    RemoteUrl { url: String },
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelSource::InMemory { estimator } => write!(f, "in-memory ({})", estimator.kind()),
            ModelSource::LocalFile { path, .. } => write!(f, "file {}", path.display()),
            ModelSource::RemoteUrl { url } => write!(f, "url {}", url),
        }
    }
}

/// A named model and where to get it. The name is the registry key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub source: ModelSource,
}

impl ModelDescriptor {
    pub fn in_memory(name: impl Into<String>, estimator: EstimatorSpec) -> Self {
        Self { name: name.into(), source: ModelSource::InMemory { estimator } }
    }

    pub fn local_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), source: ModelSource::LocalFile { path: path.into(), estimator: None } }
    }

    /// A local artifact that `train` writes by fitting `estimator`.
    pub fn trained_file(name: impl Into<String>, path: impl Into<PathBuf>, estimator: EstimatorSpec) -> Self {
        Self {
            name: name.into(),
            source: ModelSource::LocalFile { path: path.into(), estimator: Some(estimator) },
        }
    }

    pub fn remote_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), source: ModelSource::RemoteUrl { url: url.into() } }
    }
}

/// Resolution state of a registered model. Moves one way, on first success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unresolved,
    Resolved,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelState::Unresolved => write!(f, "not loaded"),
            ModelState::Resolved => write!(f, "loaded"),
        }
    }
}

/// Errors raised by the model registry
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// A descriptor with this name is already registered
    DuplicateName(String),
    /// No descriptor with this name
    UnknownModel(String),
    /// The local artifact file does not exist
    ArtifactNotFound { model: String, path: PathBuf },
    /// The remote fetch failed or returned a non-2xx status
    Network { model: String, url: String, status: Option<u16>, message: String },
    /// The artifact bytes could not be decoded
    Deserialization { model: String, message: String },
    /// Fitting an in-memory estimator failed
    Fit { model: String, message: String },
    /// The model could not score the row
    Predict { model: String, message: String },
    /// The row's columns differ from the model's
    SchemaMismatch { model: String, missing: Vec<String>, unexpected: Vec<String> },
}

impl RegistryError {
    /// Short category name, used in result tables.
    pub fn category(&self) -> &'static str {
        match self {
            RegistryError::DuplicateName(_) => "duplicate name",
            RegistryError::UnknownModel(_) => "unknown model",
            RegistryError::ArtifactNotFound { .. } => "artifact not found",
            RegistryError::Network { .. } => "network error",
            RegistryError::Deserialization { .. } => "corrupt artifact",
            RegistryError::Fit { .. } => "fit failed",
            RegistryError::Predict { .. } => "predict failed",
            RegistryError::SchemaMismatch { .. } => "schema mismatch",
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryError::DuplicateName(name) => {
                write!(f, "Model '{}' is already registered", name)
            }
            RegistryError::UnknownModel(name) => write!(f, "No model named '{}'", name),
            RegistryError::ArtifactNotFound { model, path } => write!(
                f,
                "Artifact for '{}' not found at {}",
                model,
                path.display()
            ),
            RegistryError::Network { model, url, status, message } => match status {
                Some(code) => write!(
                    f,
                    "Fetching '{}' from {} failed with HTTP {}: {}",
                    model, url, code, message
                ),
                None => write!(f, "Fetching '{}' from {} failed: {}", model, url, message),
            },
            RegistryError::Deserialization { model, message } => {
                write!(f, "Could not decode artifact for '{}': {}", model, message)
            }
            RegistryError::Fit { model, message } => {
                write!(f, "Could not fit '{}': {}", model, message)
            }
            RegistryError::Predict { model, message } => {
                write!(f, "'{}' could not predict: {}", model, message)
            }
            RegistryError::SchemaMismatch { model, missing, unexpected } => {
                write!(f, "Input does not match the columns of '{}'", model)?;
                if !missing.is_empty() {
                    write!(f, "; missing [{}]", missing.join(", "))?;
                }
                if !unexpected.is_empty() {
                    write!(f, "; unexpected [{}]", unexpected.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

impl Error for RegistryError {}

/// Outcome of one model's prediction
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionStatus {
    Ok,
    /// The model could not be resolved
    LoadError(RegistryError),
    /// The model resolved but could not score the row
    PredictError(RegistryError),
}

impl PredictionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, PredictionStatus::Ok)
    }

    pub fn error(&self) -> Option<&RegistryError> {
        match self {
            PredictionStatus::Ok => None,
            PredictionStatus::LoadError(e) | PredictionStatus::PredictError(e) => Some(e),
        }
    }
}

/// One row of the comparison table.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub model_name: String,
    pub predicted_label: Option<i64>,
    /// Probability of `predicted_label`
    pub confidence: Option<f64>,
    /// Class labels, aligned with `probabilities`
    pub classes: Vec<i64>,
    pub probabilities: Vec<f64>,
    pub status: PredictionStatus,
}

impl PredictionResult {
    pub fn ok(
        model_name: impl Into<String>,
        label: i64,
        confidence: f64,
        classes: Vec<i64>,
        probabilities: Vec<f64>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            predicted_label: Some(label),
            confidence: Some(confidence),
            classes,
            probabilities,
            status: PredictionStatus::Ok,
        }
    }

    pub fn load_error(model_name: impl Into<String>, error: RegistryError) -> Self {
        Self::failed(model_name.into(), PredictionStatus::LoadError(error))
    }

    pub fn predict_error(model_name: impl Into<String>, error: RegistryError) -> Self {
        Self::failed(model_name.into(), PredictionStatus::PredictError(error))
    }

    fn failed(model_name: String, status: PredictionStatus) -> Self {
        Self {
            model_name,
            predicted_label: None,
            confidence: None,
            classes: Vec::new(),
            probabilities: Vec::new(),
            status,
        }
    }

    /// Probability assigned to `label`, if the model knows that class.
    pub fn probability_of(&self, label: i64) -> Option<f64> {
        self.classes
            .iter()
            .position(|&c| c == label)
            .and_then(|i| self.probabilities.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_toml_shape() {
        let descriptor: ModelDescriptor = serde_json::from_value(serde_json::json!({
            "name": "Random Forest",
            "source": { "type": "in_memory", "estimator": { "kind": "random_forest", "n_trees": 5 } }
        }))
        .unwrap();
        assert_eq!(descriptor.name, "Random Forest");
        assert!(matches!(
            descriptor.source,
            ModelSource::InMemory { estimator: EstimatorSpec::RandomForest { n_trees: 5, .. } }
        ));

        let remote: ModelDescriptor = serde_json::from_value(serde_json::json!({
            "name": "lgbm",
            "source": { "type": "remote_url", "url": "http://host/artifacts/lgbm.tabm" }
        }))
        .unwrap();
        assert_eq!(remote, ModelDescriptor::remote_url("lgbm", "http://host/artifacts/lgbm.tabm"));
    }

    #[test]
    fn test_schema_mismatch_message_lists_columns() {
        let err = RegistryError::SchemaMismatch {
            model: "m".into(),
            missing: vec!["Torque [Nm]".into()],
            unexpected: vec![],
        };
        assert_eq!(err.to_string(), "Input does not match the columns of 'm'; missing [Torque [Nm]]");
    }

    #[test]
    fn test_failed_result_has_no_prediction() {
        let result = PredictionResult::load_error("m", RegistryError::UnknownModel("m".into()));
        assert_eq!(result.predicted_label, None);
        assert!(!result.status.is_ok());
        assert_eq!(result.status.error().map(|e| e.category()), Some("unknown model"));
    }

    #[test]
    fn test_probability_of_class() {
        let result = PredictionResult::ok("m", 1, 0.8, vec![0, 1], vec![0.2, 0.8]);
        assert_eq!(result.probability_of(1), Some(0.8));
        assert_eq!(result.probability_of(7), None);
    }
}
