//! Export-only command.

use super::{Outcome, Services};
use colored::Colorize;
use plate_ocr_training::{ExportConfig, Exporter, TrainingError};
use std::path::Path;
use tracing::info;

pub async fn execute(model: &Path, config: &ExportConfig, services: &Services) -> Outcome {
    println!();
    println!("{} {}", "Loading model from".bold().cyan(), model.display());

    let handle = match services.model.load(model).await.map_err(TrainingError::into_library) {
        Ok(handle) => handle,
        Err(e) => return Outcome::failed("export", &e),
    };

    info!(classes = handle.class_count(), "model loaded");
    println!("  Classes: {}", handle.class_count());
    let names: Vec<&str> = handle.names.values().map(String::as_str).collect();
    println!("  Names:   {}", names.join(", ").dimmed());

    match Exporter::new(services.model.clone()).export(&handle, config).await {
        Ok(artifact) => {
            println!();
            println!("{}", "Export complete".bold().green());
            println!("  File:   {}", artifact.path.display().to_string().cyan());
            println!("  SHA256: {}", artifact.sha256.dimmed());
            println!();
            println!("  {}", "Pre- and post-processing are not part of the graph; the consuming application performs them.".dimmed());
            println!();
            Outcome::Success
        }
        Err(e) => Outcome::failed("export", &e),
    }
}
