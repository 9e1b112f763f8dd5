//! Command-line subcommands and the helpers they share with the session.

mod compare;
mod predict;
mod train;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use tracing::{info, warn};

use crate::config::Settings;
use crate::data::{parse_assignment, Dataset, InputForm, TrainingSplit};
use crate::registry::{ArtifactFetcher, HttpFetcher, ModelRegistry};
use crate::server::ArtifactServer;
use crate::session::display::{self, ModelStatusRow};

pub use compare::run_compare;
pub use predict::{predict_failure, run_predict};
pub use train::{run_train, train_jobs, TrainJob};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive session (default)
    Session,
    /// Fit or load every configured model on a dataset and compare predictions
    Compare {
        /// CSV dataset, overrides dataset.path
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Override an input value, e.g. --set "Area=12.5"
        #[arg(long = "set", value_name = "COLUMN=VALUE")]
        set: Vec<String>,
    },
    /// Predict machine failure with one model
    Predict {
        /// Model name (or its number in `models`)
        #[arg(long)]
        model: String,
        /// Override an input value, e.g. --set "Torque=55"
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    /// Fit the in-memory models and trainable local files and write their artifacts
    Train {
        /// CSV dataset, overrides dataset.path
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Output directory, defaults to artifacts.directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Serve the artifact directory over HTTP
    Serve,
    /// List configured models
    Models,
}

/// A registry holding every configured model, nothing resolved yet.
pub fn build_registry(settings: &Settings) -> Result<ModelRegistry> {
    let timeout = settings.remote.timeout_secs.map(Duration::from_secs);
    let fetcher = HttpFetcher::with_timeout(timeout).context("Failed to build HTTP client")?;
    let mut registry = ModelRegistry::with_fetcher(fetcher);
    for descriptor in &settings.models {
        registry.register(descriptor.clone())?;
    }
    info!("Registry built with {} models", registry.descriptors().len());
    Ok(registry)
}

/// Loads the dataset at `csv` (or `dataset.path`) and splits it.
///
/// Returns `None` when no dataset is configured.
pub fn load_dataset(settings: &Settings, csv: Option<&Path>) -> Result<Option<(Dataset, TrainingSplit)>> {
    let Some(path) = csv.or(settings.dataset.path.as_deref()) else {
        return Ok(None);
    };
    let dataset = if settings.dataset.feature_columns.is_empty() {
        Dataset::from_csv(path)?
    } else {
        let mut columns = settings.dataset.feature_columns.clone();
        columns.push(settings.dataset.label_column.clone());
        Dataset::from_csv_columns(path, &columns)?
    };
    let split = dataset
        .train_test_split(
            &settings.dataset.label_column,
            settings.dataset.test_size,
            settings.dataset.seed,
        )
        .with_context(|| format!("Could not split '{}'", path.display()))?;
    Ok(Some((dataset, split)))
}

/// Applies `column=value` overrides to the form.
pub fn apply_assignments(form: &mut InputForm, assignments: &[String]) -> Result<()> {
    for assignment in assignments {
        let (name, value) = parse_assignment(assignment)
            .ok_or_else(|| anyhow!("Expected COLUMN=VALUE, got '{}'", assignment))?;
        form.set(&name, value)?;
    }
    Ok(())
}

/// Finds a registered name by exact name, case-insensitive name, or its
/// 1-based position.
pub fn lookup_model<F: ArtifactFetcher>(registry: &ModelRegistry<F>, query: &str) -> Option<String> {
    let query = query.trim();
    let names = registry.names();
    if let Some(name) = names.iter().find(|n| n.as_str() == query) {
        return Some(name.clone());
    }
    if let Ok(number) = query.parse::<usize>() {
        if number >= 1 && number <= names.len() {
            return Some(names[number - 1].clone());
        }
    }
    names.into_iter().find(|n| n.eq_ignore_ascii_case(query))
}

/// Resolves every registered model and scores it on the holdout part of the
/// attached split.
pub async fn resolve_with_status<F: ArtifactFetcher>(registry: &mut ModelRegistry<F>) -> Vec<ModelStatusRow> {
    let pb = display::spinner("Loading models...");
    let names = registry.names();
    let mut rows = Vec::with_capacity(names.len());

    for name in names {
        pb.set_message(format!("Loading {}...", name));
        let row = match registry.resolve(&name).await {
            Ok(model) => {
                let accuracy = if registry.training_split().is_some() {
                    registry.evaluate(&name).await.ok()
                } else {
                    None
                };
                ModelStatusRow {
                    name,
                    kind: Some(model.kind().to_string()),
                    origin: Some(model.origin().to_string()),
                    accuracy,
                    error: None,
                }
            }
            Err(e) => ModelStatusRow { name, kind: None, origin: None, accuracy: None, error: Some(e) },
        };
        rows.push(row);
    }

    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    pb.finish_with_message(format!("{} models ready, {} failed", rows.len() - failed, failed));
    rows
}

/// Runs the artifact server until interrupted.
pub async fn run_serve(settings: &Settings) -> Result<()> {
    let server = ArtifactServer::new(
        settings.artifacts.directory.clone(),
        settings.server.host.clone(),
        settings.server.port,
    );
    println!(
        "Serving {} on http://{}:{}",
        settings.artifacts.directory.display(),
        settings.server.host,
        settings.server.port
    );
    server.start().await.map_err(|e| anyhow!(e))
}

/// Prints the configured models.
pub fn run_models(settings: &Settings) -> Result<()> {
    let registry = build_registry(settings)?;
    display::display_models(&registry);
    Ok(())
}

/// Dispatches a subcommand.
pub async fn run(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Session => crate::session::session_loop(settings).await,
        Command::Compare { csv, set } => run_compare(settings, csv.as_deref(), &set).await,
        Command::Predict { model, set } => run_predict(settings, &model, &set).await,
        Command::Train { csv, out } => run_train(settings, csv.as_deref(), out.as_deref()),
        Command::Serve => run_serve(settings).await,
        Command::Models => run_models(settings),
    }
}

/// Loads the configured dataset for a model that needs fitting, warning
/// instead of failing when it is unavailable.
pub(crate) fn attach_dataset_if_available<F: ArtifactFetcher>(
    settings: &Settings,
    registry: &mut ModelRegistry<F>,
) -> Option<Dataset> {
    match load_dataset(settings, None) {
        Ok(Some((dataset, split))) => {
            registry.set_training_split(split);
            Some(dataset)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Dataset unavailable: {:#}", e);
            None
        }
    }
}

pub(crate) fn ensure_models(settings: &Settings) -> Result<()> {
    if settings.models.is_empty() {
        bail!("No models configured; add [[models]] entries to the configuration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::EstimatorSpec;
    use crate::registry::ModelDescriptor;

    #[test]
    fn test_lookup_by_name_number_and_case() {
        let mut registry = ModelRegistry::new();
        registry
            .register(ModelDescriptor::in_memory("Random Forest", EstimatorSpec::random_forest()))
            .unwrap();
        registry
            .register(ModelDescriptor::in_memory("XGBoost", EstimatorSpec::gradient_boosting()))
            .unwrap();

        assert_eq!(lookup_model(&registry, "XGBoost").as_deref(), Some("XGBoost"));
        assert_eq!(lookup_model(&registry, "2").as_deref(), Some("XGBoost"));
        assert_eq!(lookup_model(&registry, "random forest").as_deref(), Some("Random Forest"));
        assert_eq!(lookup_model(&registry, "3"), None);
        assert_eq!(lookup_model(&registry, "svm"), None);
    }
}
