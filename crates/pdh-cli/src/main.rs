//! pdh - harvest PDS planetary data descriptions into a STAC tree

use clap::Parser;
use pdh_cli::Cli;
use pdh_common::logging::{init_logging, LogConfig};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Environment variables win over the CLI flag
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if std::env::var("PDH_LOG_LEVEL").is_err() {
        if let Ok(level) = cli.level.parse() {
            log_config.level = level;
        }
    }
    let _ = init_logging(&log_config);

    if let Err(err) = pdh_cli::execute(&cli).await {
        error!(error = %err, "Command failed");
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
