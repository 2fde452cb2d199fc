use anyhow::Result;
use clap::Parser;
use fieldops_app::{build_tracker_store, run_command, AppContext, Cli, CommandOutcome};
use fieldops_config::{load_from_env, load_from_path, FieldopsConfig};
use fieldops_domain::CoreError;
use std::io::Write;
use std::path::Path;
use time::OffsetDateTime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_file_logging(&config.logging.file)?;
    tracing::info!(command = ?cli.command, "fieldops starting");

    let store = build_tracker_store(&config)?;
    let context = AppContext::new(config, store, OffsetDateTime::now_utc())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = match run_command(&cli.command, cli.json, &context, &mut out).await {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(error = %error, "command failed");
            return Err(error.into());
        }
    };
    out.flush()?;

    if outcome != CommandOutcome::Success {
        std::process::exit(outcome.exit_code());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<FieldopsConfig> {
    let config = match cli.config.as_deref() {
        Some(path) => load_from_path(path)?,
        None => load_from_env()?,
    };
    Ok(config)
}

fn init_file_logging(log_file: &str) -> Result<(), CoreError> {
    let log_path = Path::new(log_file);
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CoreError::Configuration(format!(
                    "failed to create fieldops log directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|error| {
            CoreError::Configuration(format!(
                "failed to open fieldops log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}
