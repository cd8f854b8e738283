//! `plate-ocr-export` - export a trained model to a static-shape ONNX graph.
//!
//! The graph is always simplified, static-shape, full precision, opset 12.
//! Exit status is 0 on success and 1 on any failure.

use anyhow::Context;
use clap::Parser;
use plate_ocr_cli::cli::ExportArgs;
use plate_ocr_cli::commands::{self, Services};
use plate_ocr_cli::config::PlateOcrConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ExportArgs::parse();

    let config = PlateOcrConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let level = args.log_level.clone().or_else(|| config.log_level.clone()).unwrap_or_else(|| "info".to_string());
    plate_ocr_cli::init_tracing(&level)?;

    let services = Services::from_config(&config);
    let outcome = commands::dispatch(args.into_command(), &services).await;
    std::process::exit(outcome.exit_code());
}
