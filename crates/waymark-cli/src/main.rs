//! waymark - keep a list of map markers from the terminal.
//!
//! Markers live in an ordered active list and a history. Markers added
//! without a name get their address from a reverse geocoding service.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waymark_core::Config;

use commands::{Command, USAGE};

// ============================================================================
// Constants
// ============================================================================

/// Prefix for daily log files written to the configured log directory
const LOG_FILE_PREFIX: &str = "waymark.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer and must be kept alive until
/// the program exits.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let (mut config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env();

    let _guard = init_tracing(config.log_dir.as_deref());
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {:#}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {:#}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    info!(?command, "waymark starting");
    commands::run(command, &mut config).await
}
