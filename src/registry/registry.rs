use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ndarray::Axis;
use tracing::{debug, info, warn};

use super::fetch::{ArtifactFetcher, HttpFetcher};
use super::resolved::{ModelOrigin, ResolvedModel};
use super::types::{
    ModelDescriptor, ModelSource, ModelState, PredictionResult, RegistryError,
};
use crate::artifact::{ArtifactError, ModelArtifact};
use crate::data::{FeatureRow, TrainingSplit};
use crate::estimator::{Classifier, EstimatorSpec};

/// Named models, resolved lazily and cached for the life of the registry.
///
/// Each session or command owns one registry. All I/O happens inside
/// `resolve`; a failed resolution is not cached, so the next call retries.
pub struct ModelRegistry<F = HttpFetcher> {
    /// Registered descriptors, in registration order
    descriptors: Vec<ModelDescriptor>,
    /// Successfully resolved models by name
    cache: HashMap<String, Arc<ResolvedModel>>,
    /// Training data for `InMemory` models
    training: Option<TrainingSplit>,
    fetcher: F,
}

impl ModelRegistry<HttpFetcher> {
    pub fn new() -> Self {
        Self::with_fetcher(HttpFetcher::new())
    }
}

impl Default for ModelRegistry<HttpFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ArtifactFetcher> ModelRegistry<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            descriptors: Vec::new(),
            cache: HashMap::new(),
            training: None,
            fetcher,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Attaches the data `InMemory` models are fit on.
    ///
    /// Models already fit on a previous split are dropped from the cache and
    /// refit on their next resolution.
    pub fn set_training_split(&mut self, split: TrainingSplit) {
        let stale: Vec<String> = self
            .descriptors
            .iter()
            .filter(|d| matches!(d.source, ModelSource::InMemory { .. }))
            .map(|d| d.name.clone())
            .filter(|name| self.cache.contains_key(name))
            .collect();
        for name in stale {
            debug!("Evicting '{}' fit on the previous training split", name);
            self.cache.remove(&name);
        }
        info!(
            "Training split attached: {} train rows, {} test rows, {} features",
            split.x_train.nrows(),
            split.x_test.nrows(),
            split.feature_names.len()
        );
        self.training = Some(split);
    }

    pub fn training_split(&self) -> Option<&TrainingSplit> {
        self.training.as_ref()
    }

    /// Adds a descriptor. No I/O happens until the model is resolved.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<(), RegistryError> {
        if self.descriptor(&descriptor.name).is_some() {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }
        debug!("Registered '{}' ({})", descriptor.name, descriptor.source);
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    pub fn state(&self, name: &str) -> Option<ModelState> {
        self.descriptor(name)?;
        Some(if self.cache.contains_key(name) {
            ModelState::Resolved
        } else {
            ModelState::Unresolved
        })
    }

    /// The cached model, without resolving.
    pub fn cached(&self, name: &str) -> Option<Arc<ResolvedModel>> {
        self.cache.get(name).cloned()
    }

    /// Returns the model for `name`, loading or fitting it on first use.
    pub async fn resolve(&mut self, name: &str) -> Result<Arc<ResolvedModel>, RegistryError> {
        if let Some(model) = self.cache.get(name) {
            debug!("'{}' served from cache", name);
            return Ok(Arc::clone(model));
        }

        let source = self
            .descriptor(name)
            .map(|d| d.source.clone())
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))?;

        let resolved = match &source {
            ModelSource::InMemory { estimator } => self.fit_in_memory(name, estimator),
            ModelSource::LocalFile { path, .. } => Self::load_local(name, path),
            ModelSource::RemoteUrl { url } => self.load_remote(name, url).await,
        };

        match resolved {
            Ok(model) => {
                info!(
                    "Resolved '{}' ({}, {} features) from {}",
                    name,
                    model.kind(),
                    model.feature_names().len(),
                    model.origin()
                );
                let model = Arc::new(model);
                self.cache.insert(name.to_string(), Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                warn!("Failed to resolve '{}': {}", name, e);
                Err(e)
            }
        }
    }

    /// Resolves each name in order. One failure does not stop the rest.
    pub async fn resolve_all<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Vec<(String, Result<Arc<ResolvedModel>, RegistryError>)> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            results.push((name.to_string(), self.resolve(name).await));
        }
        results
    }

    /// `resolve_all` over every registered model.
    pub async fn resolve_registered(
        &mut self,
    ) -> Vec<(String, Result<Arc<ResolvedModel>, RegistryError>)> {
        let names = self.names();
        self.resolve_all(&names).await
    }

    /// Scores `row` with one model. Failures become the result's status.
    pub async fn predict(&mut self, name: &str, row: &FeatureRow) -> PredictionResult {
        let model = match self.resolve(name).await {
            Ok(model) => model,
            Err(e) => return PredictionResult::load_error(name, e),
        };

        match model.predict_with_confidence(row) {
            Ok((label, confidence, probabilities)) => {
                debug!("'{}' predicted {} ({:.3})", name, label, confidence);
                PredictionResult::ok(name, label, confidence, model.classes().to_vec(), probabilities)
            }
            Err(e) => {
                warn!("'{}' could not score the row: {}", name, e);
                PredictionResult::predict_error(name, e)
            }
        }
    }

    /// `predict` for every registered model, in registration order.
    pub async fn predict_all(&mut self, row: &FeatureRow) -> Vec<PredictionResult> {
        let names = self.names();
        let mut results = Vec::with_capacity(names.len());
        for name in &names {
            results.push(self.predict(name, row).await);
        }
        results
    }

    /// Holdout accuracy of a model on the attached split.
    pub async fn evaluate(&mut self, name: &str) -> Result<f64, RegistryError> {
        let model = self.resolve(name).await?;
        let split = self.training.as_ref().ok_or_else(|| RegistryError::Predict {
            model: name.to_string(),
            message: "no holdout data attached".into(),
        })?;

        let needed = model.feature_names();
        let missing: Vec<String> =
            needed.iter().filter(|c| !split.feature_names.contains(c)).cloned().collect();
        let unexpected: Vec<String> =
            split.feature_names.iter().filter(|c| !needed.contains(c)).cloned().collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(RegistryError::SchemaMismatch { model: name.to_string(), missing, unexpected });
        }

        // Same columns, possibly in another order.
        let order: Vec<usize> = needed
            .iter()
            .filter_map(|c| split.feature_names.iter().position(|s| s == c))
            .collect();
        let x_test = split.x_test.select(Axis(1), &order);
        Ok(model.score(x_test.view(), &split.y_test))
    }

    fn fit_in_memory(&self, name: &str, spec: &EstimatorSpec) -> Result<ResolvedModel, RegistryError> {
        let split = self.training.as_ref().ok_or_else(|| RegistryError::Fit {
            model: name.to_string(),
            message: "no training data attached".into(),
        })?;

        debug!("Fitting '{}' ({}) on {} rows", name, spec.kind(), split.x_train.nrows());
        let mut estimator = spec.build();
        estimator
            .fit(split.x_train.view(), &split.y_train)
            .map_err(|e| RegistryError::Fit { model: name.to_string(), message: e.to_string() })?;

        let artifact = ModelArtifact::new(split.feature_names.clone(), estimator);
        Ok(ResolvedModel::new(name, ModelOrigin::Fitted, artifact))
    }

    fn load_local(name: &str, path: &Path) -> Result<ResolvedModel, RegistryError> {
        if !path.is_file() {
            return Err(RegistryError::ArtifactNotFound {
                model: name.to_string(),
                path: path.to_path_buf(),
            });
        }

        let artifact = ModelArtifact::read(path).map_err(|e| match e {
            ArtifactError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                RegistryError::ArtifactNotFound { model: name.to_string(), path: path.to_path_buf() }
            }
            other => RegistryError::Deserialization { model: name.to_string(), message: other.to_string() },
        })?;
        Ok(ResolvedModel::new(name, ModelOrigin::File(path.to_path_buf()), artifact))
    }

    async fn load_remote(&self, name: &str, url: &str) -> Result<ResolvedModel, RegistryError> {
        let bytes = self.fetcher.fetch(url).await.map_err(|e| RegistryError::Network {
            model: name.to_string(),
            url: url.to_string(),
            status: e.status,
            message: e.message,
        })?;

        let artifact = ModelArtifact::from_bytes(&bytes).map_err(|e| {
            RegistryError::Deserialization { model: name.to_string(), message: e.to_string() }
        })?;
        Ok(ResolvedModel::new(name, ModelOrigin::Remote(url.to_string()), artifact))
    }
}
