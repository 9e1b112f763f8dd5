use std::path::Path;

use anyhow::{bail, Result};
use colored::*;
use tracing::info;

use super::{apply_assignments, build_registry, ensure_models, load_dataset, resolve_with_status};
use crate::config::Settings;
use crate::data::InputForm;
use crate::session::display;

/// Fits or loads every configured model on the dataset, then compares their
/// predictions for the column-mean row.
pub async fn run_compare(settings: &Settings, csv: Option<&Path>, assignments: &[String]) -> Result<()> {
    ensure_models(settings)?;
    let Some((dataset, split)) = load_dataset(settings, csv)? else {
        bail!("No dataset configured; pass --csv or set dataset.path");
    };
    println!("{}", "Dataset loaded successfully".green());
    display::display_dataset_preview(&dataset, 5);

    let mut registry = build_registry(settings)?;
    registry.set_training_split(split);

    let status = resolve_with_status(&mut registry).await;
    display::display_model_status(&status);

    let mut form = InputForm::from_dataset(&dataset, &settings.dataset.label_column, &settings.inputs);
    apply_assignments(&mut form, assignments)?;
    display::display_inputs(&form);

    let row = form.to_row();
    let results = registry.predict_all(&row).await;
    info!(
        "Compared {} models, {} succeeded",
        results.len(),
        results.iter().filter(|r| r.status.is_ok()).count()
    );

    println!("\n{}", "Model Predictions".bold());
    display::display_predictions(&results);
    Ok(())
}
