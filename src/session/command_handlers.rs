use colored::*;

use crate::commands::{lookup_model, resolve_with_status};
use crate::data::{parse_assignment, InputForm};
use crate::registry::ModelRegistry;
use crate::session::display::{
    display_inputs, display_model_status, display_models, display_predictions, spinner,
};

/// State the session handlers work on
///
/// # Fields
///
/// * `registry` - The session's model registry; resolved models live as long as it does
/// * `form` - Current input values
/// * `selected` - Model used by `predict` when no name is given
pub(super) struct SessionContext<'a> {
    pub registry: &'a mut ModelRegistry,
    pub form: &'a mut InputForm,
    pub selected: &'a mut Option<String>,
}

pub(super) fn handle_list_models(context: &SessionContext<'_>) {
    display_models(&*context.registry);
}

/// `load` resolves everything, `load <name>` one model.
pub(super) async fn handle_load(context: &mut SessionContext<'_>, target: &str) {
    if target.is_empty() {
        let status = resolve_with_status(&mut *context.registry).await;
        display_model_status(&status);
        return;
    }

    let Some(name) = lookup_model(&*context.registry, target) else {
        println!("{}", format!("No model named '{}'. Use 'models' to list them.", target).yellow());
        return;
    };

    let pb = spinner(format!("Loading {}...", name));
    let result = context.registry.resolve(&name).await;
    pb.finish_and_clear();
    match result {
        Ok(model) => {
            println!("Loaded [{}] {} from {}", name.yellow(), model.kind().magenta(), model.origin());
            *context.selected = Some(name);
        }
        Err(e) => println!("{}", format!("Error: {}", e).red()),
    }
}

pub(super) fn handle_show_inputs(context: &SessionContext<'_>) {
    display_inputs(context.form);
}

/// `set <field> <value>` or `set <field>=<value>`.
pub(super) fn handle_set(context: &mut SessionContext<'_>, args: &str) {
    let parsed = parse_assignment(args)
        .map(|(name, value)| (name, value.to_string()))
        .or_else(|| {
            args.trim()
                .rsplit_once(char::is_whitespace)
                .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        });

    let Some((name, value)) = parsed else {
        println!("Usage: set <field> <value>");
        return;
    };

    match context.form.set_str(&name, &value) {
        Ok(()) => println!("{} = {}", name.yellow(), value),
        Err(e) => println!("{}", format!("Error: {}", e).red()),
    }
}

pub(super) fn handle_reset(context: &mut SessionContext<'_>) {
    context.form.reset();
    println!("Inputs reset to their defaults");
}

/// Predicts with one model: the named one, the last loaded one, or the first
/// registered one.
pub(super) async fn handle_predict(context: &mut SessionContext<'_>, target: &str) {
    let name = if target.is_empty() {
        context
            .selected
            .clone()
            .or_else(|| context.registry.names().into_iter().next())
    } else {
        lookup_model(&*context.registry, target)
    };

    let Some(name) = name else {
        println!("{}", format!("No model named '{}'. Use 'models' to list them.", target).yellow());
        return;
    };

    let row = context.form.to_row();
    let pb = spinner(format!("Predicting with {}...", name));
    let result = context.registry.predict(&name, &row).await;
    pb.finish_and_clear();

    display_predictions(std::slice::from_ref(&result));
    *context.selected = Some(name);
}

pub(super) async fn handle_compare(context: &mut SessionContext<'_>) {
    let row = context.form.to_row();
    let pb = spinner("Comparing models...");
    let results = context.registry.predict_all(&row).await;
    pb.finish_and_clear();
    display_predictions(&results);
}
