//! Plate OCR CLI - command-line tools for the plate character detector.
//!
//! Two binaries share this library:
//! - `plate-ocr` builds the dataset descriptor, trains, and validates.
//! - `plate-ocr-export` exports a trained model to ONNX.

pub mod cli;
pub mod commands;
pub mod config;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global tracing subscriber. Logs go to stderr so command
/// summaries on stdout stay clean.
pub fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
