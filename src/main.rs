use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tabpredict::commands::{self, Command};
use tabpredict::config::Settings;

/// Compare tabular classifiers from in-memory, local and remote sources
#[derive(Debug, Parser)]
#[command(name = "tabpredict", version, about)]
struct Cli {
    /// Directory holding default.toml and an optional local.toml
    #[arg(long, default_value = "config")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Main entry point for tabpredict
///
/// Loads settings, sets up file logging, then runs the requested
/// subcommand (the interactive session when none is given).
///
/// # Errors
/// Returns an error if the configuration is invalid or the subcommand fails
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load settings first
    let settings = Settings::load(&cli.config)?;

    // Initialize the subscriber first, before any file operations
    let log_path = settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs"));
    std::fs::create_dir_all(log_path)?;
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        log_path,
        "tabpredict",
    );

    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // Disable ANSI colors for cleaner log files
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_env_filter(filter);
    if settings.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("tabpredict starting up...");
    let full_log_path = std::fs::canonicalize(log_path)?;
    info!("Log directory: {}", full_log_path.display());

    let artifacts_path = std::fs::canonicalize(&settings.artifacts.directory)?;
    info!("Artifact directory: {}", artifacts_path.display());
    info!("Settings loaded from {}", cli.config.display());

    let command = cli.command.unwrap_or(Command::Session);
    commands::run(command, &settings).await
}
