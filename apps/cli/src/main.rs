//! `plate-ocr` - train, validate and configure the plate character detector.
//!
//! Exit status: 0 on success, 1 when the selected stage fails, 3 when
//! training succeeded but the chained ONNX export failed.

use anyhow::Context;
use clap::Parser;
use plate_ocr_cli::cli::Args;
use plate_ocr_cli::commands::{self, Services};
use plate_ocr_cli::config::PlateOcrConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = PlateOcrConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let level = args.log_level.clone().or_else(|| config.log_level.clone()).unwrap_or_else(|| "info".to_string());
    plate_ocr_cli::init_tracing(&level)?;

    let services = Services::from_config(&config);
    let command = args.into_command(&config);
    tracing::debug!(command = command.name(), python = %config.python(), "dispatching");

    let outcome = commands::dispatch(command, &services).await;
    std::process::exit(outcome.exit_code());
}
