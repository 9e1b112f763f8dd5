use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::*;
use comfy_table::{Cell, Color, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::load_dataset;
use crate::artifact::{ModelArtifact, ARTIFACT_EXTENSION};
use crate::config::Settings;
use crate::data::TrainingSplit;
use crate::estimator::{Classifier, EstimatorSpec};
use crate::registry::ModelSource;
use crate::session::display;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// File stem for a model name: lowercase, runs of other characters become `_`.
pub fn slug(name: &str) -> String {
    let lower = name.to_lowercase();
    NON_ALPHANUMERIC.replace_all(&lower, "_").trim_matches('_').to_string()
}

/// A model `train` knows how to produce, and where its artifact goes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainJob {
    pub name: String,
    pub estimator: EstimatorSpec,
    pub path: PathBuf,
}

/// In-memory models are written as `<out_dir>/<slug>.tabm`. Local files that
/// name an estimator are written to their configured path, or into `out`
/// under the same file name when it is given.
pub fn train_jobs(settings: &Settings, out: Option<&Path>) -> Vec<TrainJob> {
    let out_dir = out.map(Path::to_path_buf).unwrap_or_else(|| settings.artifacts.directory.clone());
    settings
        .models
        .iter()
        .filter_map(|descriptor| {
            let (estimator, path) = match &descriptor.source {
                ModelSource::InMemory { estimator } => (
                    estimator.clone(),
                    out_dir.join(format!("{}.{}", slug(&descriptor.name), ARTIFACT_EXTENSION)),
                ),
                ModelSource::LocalFile { path, estimator: Some(estimator) } => {
                    let path = match (out, path.file_name()) {
                        (Some(dir), Some(file)) => dir.join(file),
                        _ => path.clone(),
                    };
                    (estimator.clone(), path)
                }
                _ => return None,
            };
            Some(TrainJob { name: descriptor.name.clone(), estimator, path })
        })
        .collect()
}

/// Fits every trainable model on the dataset and writes its artifact.
pub fn run_train(settings: &Settings, csv: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let Some((_, split)) = load_dataset(settings, csv)? else {
        bail!("No dataset configured; pass --csv or set dataset.path");
    };
    let jobs = train_jobs(settings, out);
    if jobs.is_empty() {
        bail!("No in_memory models or local_file models with an estimator configured, nothing to train");
    }

    let mut table = Table::new();
    table
        .set_header(vec!["Model", "Artifact", "Holdout accuracy"])
        .load_preset(comfy_table::presets::UTF8_FULL);

    let pb = display::spinner("Training models...");
    let mut written = 0;
    for job in &jobs {
        pb.set_message(format!("Fitting {}...", job.name));
        match fit_and_write(job, &split) {
            Ok(accuracy) => {
                written += 1;
                table.add_row(vec![
                    Cell::new(&job.name).fg(Color::Green),
                    Cell::new(job.path.display()).fg(Color::Blue),
                    Cell::new(format!("{:.2}%", accuracy * 100.0)),
                ]);
            }
            Err(e) => {
                warn!("Skipping '{}': {:#}", job.name, e);
                table.add_row(vec![
                    Cell::new(&job.name).fg(Color::Green),
                    Cell::new(format!("ERROR: {:#}", e)).fg(Color::Red),
                    Cell::new("—"),
                ]);
            }
        }
    }
    pb.finish_and_clear();

    info!("Wrote {} of {} artifacts", written, jobs.len());
    println!("\n{}", table);
    println!("{}", format!("Wrote {} of {} artifacts", written, jobs.len()).bright_green());
    if written == 0 {
        bail!("No artifact could be trained");
    }
    Ok(())
}

/// Returns the holdout accuracy of the written model.
fn fit_and_write(job: &TrainJob, split: &TrainingSplit) -> Result<f64> {
    let mut estimator = job.estimator.build();
    estimator
        .fit(split.x_train.view(), &split.y_train)
        .with_context(|| format!("Fitting {} failed", job.estimator.kind()))?;
    let accuracy = estimator.score(split.x_test.view(), &split.y_test);

    if let Some(parent) = job.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    ModelArtifact::new(split.feature_names.clone(), estimator).write(&job.path)?;
    Ok(accuracy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Logistic Regression"), "logistic_regression");
        assert_eq!(slug("  XGBoost (v2) "), "xgboost_v2");
    }
}
