use anyhow::{anyhow, Result};
use colored::*;

use super::{apply_assignments, attach_dataset_if_available, build_registry, lookup_model};
use crate::config::Settings;
use crate::data::{FeatureRow, InputForm};
use crate::registry::{ModelSource, PredictionResult, PredictionStatus};
use crate::session::display;

/// Label of the failure class.
const FAILURE: i64 = 1;

/// Predicts with one model for the configured inputs after applying
/// `assignments`. Returns the result and the row the model received.
pub async fn predict_failure(
    settings: &Settings,
    model: &str,
    assignments: &[String],
) -> Result<(PredictionResult, FeatureRow)> {
    let mut registry = build_registry(settings)?;
    let name = lookup_model(&registry, model)
        .ok_or_else(|| anyhow!("No model named '{}'; see `tabpredict models`", model))?;

    let needs_fit = matches!(
        registry.descriptor(&name).map(|d| &d.source),
        Some(ModelSource::InMemory { .. })
    );
    if needs_fit {
        attach_dataset_if_available(settings, &mut registry);
    }

    let mut form = InputForm::new(settings.inputs.clone());
    apply_assignments(&mut form, assignments)?;
    let row = form.to_row();

    let pb = display::spinner(format!("Loading {}...", name));
    let result = registry.predict(&name, &row).await;
    pb.finish_and_clear();
    Ok((result, row))
}

/// Predicts machine failure for the configured inputs with one model.
pub async fn run_predict(settings: &Settings, model: &str, assignments: &[String]) -> Result<()> {
    let (result, row) = predict_failure(settings, model, assignments).await?;

    print_verdict(&result);
    println!("\n{}", "Input Summary".bold());
    display::display_row_summary(&row);

    match result.status {
        PredictionStatus::Ok => Ok(()),
        PredictionStatus::LoadError(e) | PredictionStatus::PredictError(e) => Err(e.into()),
    }
}

/// Prints the failure verdict with the probability of the failure class.
pub fn print_verdict(result: &PredictionResult) {
    println!("\n{} {}", "Prediction Result:".bold(), result.model_name.cyan());
    match (result.predicted_label, &result.status) {
        (Some(label), PredictionStatus::Ok) => {
            let probability = result.probability_of(FAILURE).unwrap_or(0.0);
            if label == FAILURE {
                println!("{}", format!("Machine is likely to FAIL (probability: {:.2})", probability).red().bold());
            } else {
                println!("{}", format!("Machine is SAFE (probability of failure: {:.2})", probability).green().bold());
            }
        }
        (_, status) => {
            if let Some(e) = status.error() {
                println!("{}", format!("Error: {}", e).red());
            }
        }
    }
}
