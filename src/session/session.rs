use std::io::Write;

use anyhow::Result;
use colored::*;
use rustyline::DefaultEditor;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::commands::{attach_dataset_if_available, build_registry};
use crate::config::Settings;
use crate::data::InputForm;
use crate::session::display::display_dataset_preview;

use super::command_handlers::{
    SessionContext,
    handle_compare,
    handle_list_models,
    handle_load,
    handle_predict,
    handle_reset,
    handle_set,
    handle_show_inputs,
};

fn print_help() {
    println!("\n{}", "tabpredict Session Commands".cyan());
    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}      - Exit the session", "exit, bye, quit".green());
    println!("{}                 - Show this help message", "help".green());
    println!("{}                - Clear the screen", "clear".green());
    println!("{}               - List configured models and their state", "models".green());
    println!("{}   - Load all models, or one by name or number", "load [name|#]".green());
    println!("{}               - Show the current input values", "inputs".green());
    println!("{}  - Change an input value", "set <field> <value>".green());
    println!("{}                - Restore the default input values", "reset".green());
    println!("{} - Predict with one model", "predict [name|#]".green());
    println!("{}              - Predict with every model", "compare".green());
    println!();
}

/// Runs the interactive session. The session owns one registry; everything
/// it resolves is dropped when the session ends.
pub async fn session_loop(settings: &Settings) -> Result<()> {
    let session_id = Uuid::new_v4();
    let span = info_span!("session", id = %session_id);
    run(settings).instrument(span).await
}

async fn run(settings: &Settings) -> Result<()> {
    info!("Session started");
    println!("Starting session");

    let mut registry = build_registry(settings)?;
    let mut form = match attach_dataset_if_available(settings, &mut registry) {
        Some(dataset) => {
            println!("{}", "Dataset loaded successfully".green());
            display_dataset_preview(&dataset, 5);
            InputForm::from_dataset(&dataset, &settings.dataset.label_column, &settings.inputs)
        }
        None => InputForm::new(settings.inputs.clone()),
    };
    let mut selected: Option<String> = None;
    print_help();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("> ");

        match readline {
            Ok(input) => {
                let input_trimmed = input.trim();
                if input_trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input_trimmed);

                let (command, args) = match input_trimmed.split_once(char::is_whitespace) {
                    Some((command, args)) => (command.to_lowercase(), args.trim()),
                    None => (input_trimmed.to_lowercase(), ""),
                };

                if ["exit", "bye", "quit"].contains(&command.as_str()) {
                    println!("Goodbye!");
                    break;
                }

                let mut context = SessionContext {
                    registry: &mut registry,
                    form: &mut form,
                    selected: &mut selected,
                };

                match command.as_str() {
                    "help" => print_help(),
                    "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        std::io::stdout().flush()?;
                    }
                    "models" => handle_list_models(&context),
                    "load" => handle_load(&mut context, args).await,
                    "inputs" => handle_show_inputs(&context),
                    "set" => handle_set(&mut context, args),
                    "reset" => handle_reset(&mut context),
                    "predict" => handle_predict(&mut context, args).await,
                    "compare" => handle_compare(&mut context).await,
                    _ => println!("Unknown command '{}'. Type 'help' for the list.", command),
                }
            }
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        }
    }

    info!("Session ended");
    Ok(())
}
