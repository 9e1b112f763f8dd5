use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView2};

use super::types::RegistryError;
use crate::artifact::ModelArtifact;
use crate::data::FeatureRow;
use crate::estimator::{argmax, Classifier};

/// How a resolved model was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOrigin {
    Fitted,
    File(PathBuf),
    Remote(String),
}

impl fmt::Display for ModelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelOrigin::Fitted => write!(f, "fitted in session"),
            ModelOrigin::File(path) => write!(f, "{}", path.display()),
            ModelOrigin::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A model ready to score rows.
#[derive(Debug)]
pub struct ResolvedModel {
    name: String,
    origin: ModelOrigin,
    artifact: ModelArtifact,
    resolved_at: DateTime<Utc>,
}

impl ResolvedModel {
    pub fn new(name: impl Into<String>, origin: ModelOrigin, artifact: ModelArtifact) -> Self {
        Self { name: name.into(), origin, artifact, resolved_at: Utc::now() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &ModelOrigin {
        &self.origin
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    pub fn kind(&self) -> &str {
        &self.artifact.kind
    }

    /// Columns the model was fit on, in order.
    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    pub fn classes(&self) -> &[i64] {
        self.artifact.estimator.classes()
    }

    /// Class probabilities aligned with `classes()`.
    pub fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, RegistryError> {
        let values = self.row_values(row)?;
        Ok(self.artifact.estimator.predict_proba_row(values.view()))
    }

    pub fn predict(&self, row: &FeatureRow) -> Result<i64, RegistryError> {
        self.predict_with_confidence(row).map(|(label, _, _)| label)
    }

    /// Predicted label, its probability, and the full probability vector.
    pub fn predict_with_confidence(
        &self,
        row: &FeatureRow,
    ) -> Result<(i64, f64, Vec<f64>), RegistryError> {
        let proba = self.predict_proba(row)?;
        if proba.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(RegistryError::Predict {
                model: self.name.clone(),
                message: format!("model produced invalid probabilities {:?}", proba),
            });
        }
        let best = argmax(&proba);
        let label = *self.classes().get(best).ok_or_else(|| RegistryError::Predict {
            model: self.name.clone(),
            message: "model has no classes".into(),
        })?;
        Ok((label, proba[best], proba))
    }

    /// Accuracy on a labelled matrix whose columns follow `feature_names()`.
    pub fn score(&self, x: ArrayView2<'_, f64>, y: &[i64]) -> f64 {
        self.artifact.estimator.score(x, y)
    }

    fn row_values(&self, row: &FeatureRow) -> Result<Array1<f64>, RegistryError> {
        let values = row.ordered_values(self.feature_names()).map_err(|e| {
            RegistryError::SchemaMismatch {
                model: self.name.clone(),
                missing: e.missing,
                unexpected: e.unexpected,
            }
        })?;
        if let Some((column, value)) = self
            .feature_names()
            .iter()
            .zip(values.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(RegistryError::Predict {
                model: self.name.clone(),
                message: format!("{} is not a finite number ({})", column, value),
            });
        }
        Ok(values)
    }
}
