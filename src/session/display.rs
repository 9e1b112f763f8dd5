use std::time::Duration;

use colored::*;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::{Dataset, FeatureRow, InputForm};
use crate::registry::{ArtifactFetcher, ModelRegistry, ModelState, PredictionResult, PredictionStatus, RegistryError};

/// Fit or load outcome of one model, for the status table.
#[derive(Debug, Clone)]
pub struct ModelStatusRow {
    pub name: String,
    pub kind: Option<String>,
    pub origin: Option<String>,
    /// Holdout accuracy, when a split is attached
    pub accuracy: Option<f64>,
    pub error: Option<RegistryError>,
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(header(titles))
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        format!("{:.0}", value)
    } else {
        format!("{:.4}", value)
    }
}

/// A steady spinner for work of unknown length.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{prefix:.bold.dim} {spinner} {wide_msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message.into());
    pb
}

/// The comparison table: Model, Prediction, Probability, Status.
pub fn display_predictions(results: &[PredictionResult]) {
    if results.is_empty() {
        println!("{}", "No models configured".yellow());
        return;
    }

    let mut table = new_table(&["Model", "Prediction", "Probability", "Status"]);
    for result in results {
        match (&result.status, result.predicted_label, result.confidence) {
            (PredictionStatus::Ok, Some(label), Some(confidence)) => {
                table.add_row(vec![
                    Cell::new(&result.model_name).fg(Color::Green),
                    Cell::new(label).fg(Color::Yellow).set_alignment(CellAlignment::Center),
                    Cell::new(format!("{:.4}", confidence)).set_alignment(CellAlignment::Right),
                    Cell::new("OK").fg(Color::Green),
                ]);
            }
            (status, _, _) => {
                let reason = status
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no prediction".to_string());
                let prefix = match status {
                    PredictionStatus::LoadError(_) => "LOAD ERROR",
                    _ => "ERROR",
                };
                table.add_row(vec![
                    Cell::new(&result.model_name).fg(Color::Green),
                    Cell::new("ERROR").fg(Color::Red).set_alignment(CellAlignment::Center),
                    Cell::new("—").set_alignment(CellAlignment::Right),
                    Cell::new(format!("{}: {}", prefix, reason)).fg(Color::Red),
                ]);
            }
        }
    }

    println!("\n{}", table);
    let ok = results.iter().filter(|r| r.status.is_ok()).count();
    println!("{}", format!("{} of {} models predicted", ok, results.len()).bright_green());
}

/// Registered models with their source and state.
pub fn display_models<F: ArtifactFetcher>(registry: &ModelRegistry<F>) {
    if registry.descriptors().is_empty() {
        println!("{}", "No models configured".yellow());
        return;
    }

    let mut table = new_table(&["#", "Name", "Source", "State"]);
    for (i, descriptor) in registry.descriptors().iter().enumerate() {
        let state = registry.state(&descriptor.name).unwrap_or(ModelState::Unresolved);
        let state_cell = match state {
            ModelState::Resolved => Cell::new(state).fg(Color::Green),
            ModelState::Unresolved => Cell::new(state).fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::White).set_alignment(CellAlignment::Center),
            Cell::new(&descriptor.name).fg(Color::Green),
            Cell::new(&descriptor.source).fg(Color::Blue),
            state_cell,
        ]);
    }

    println!("\n{}", table);
    println!("{}", format!("Total models: {}", registry.descriptors().len()).bright_green());
}

/// Fit / load outcome per model, with holdout accuracy where known.
pub fn display_model_status(rows: &[ModelStatusRow]) {
    let mut table = new_table(&["Model", "Kind", "Origin", "Holdout accuracy", "Status"]);
    for row in rows {
        let status = match &row.error {
            None => Cell::new("fitted").fg(Color::Green),
            Some(e) => Cell::new(format!("ERROR: {}", e)).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&row.name).fg(Color::Green),
            Cell::new(row.kind.as_deref().unwrap_or("—")).fg(Color::Magenta),
            Cell::new(row.origin.as_deref().unwrap_or("—")).fg(Color::DarkGrey),
            Cell::new(row.accuracy.map_or_else(|| "—".to_string(), |a| format!("{:.2}%", a * 100.0)))
                .set_alignment(CellAlignment::Right),
            status,
        ]);
    }
    println!("\n{}", table);
}

/// Current values of the input form.
pub fn display_inputs(form: &InputForm) {
    if form.is_empty() {
        println!("{}", "No input fields configured".yellow());
        return;
    }

    let mut table = new_table(&["Field", "Column", "Value", "Range"]);
    for (field, value) in form.entries() {
        let unit = field.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default();
        let bound = |b: Option<f64>| b.map_or_else(|| "…".to_string(), format_value);
        let range = if field.min.is_none() && field.max.is_none() {
            "—".to_string()
        } else {
            format!("{} – {}", bound(field.min), bound(field.max))
        };
        table.add_row(vec![
            Cell::new(field.display_name()).fg(Color::Yellow),
            Cell::new(&field.column).fg(Color::DarkGrey),
            Cell::new(format!("{}{}", format_value(value), unit)).set_alignment(CellAlignment::Right),
            Cell::new(range).fg(Color::DarkGrey),
        ]);
    }
    println!("\n{}", table);
}

/// The first rows of a dataset.
pub fn display_dataset_preview(dataset: &Dataset, rows: usize) {
    let titles: Vec<&str> = dataset.columns().iter().map(String::as_str).collect();
    let mut table = new_table(&titles);
    for row in dataset.head(rows).rows() {
        table.add_row(row.iter().map(|v| Cell::new(format_value(*v))).collect::<Vec<_>>());
    }
    println!("\n{}", table);
    println!(
        "{}",
        format!("{} rows × {} columns", dataset.n_rows(), dataset.columns().len()).bright_black()
    );
}

/// The row as the model received it.
pub fn display_row_summary(row: &FeatureRow) {
    let mut table = new_table(&["Column", "Value"]);
    for (column, value) in row {
        table.add_row(vec![
            Cell::new(column).fg(Color::Yellow),
            Cell::new(format_value(*value)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1800.0), "1800");
        assert_eq!(format_value(573.15), "573.1500");
    }
}
