//! Training command implementation.

use super::{Outcome, Services};
use colored::Colorize;
use plate_ocr_training::{StdoutProgressSink, Trainer, TrainingConfig};
use std::path::Path;

pub async fn execute(data: &Path, config: &TrainingConfig, services: &Services) -> Outcome {
    println!();
    println!("{}", "Training plate OCR model".bold().cyan());
    println!("  Dataset:    {}", data.display());
    println!("  Epochs:     {}", config.epochs);
    println!("  Batch size: {}", config.batch);
    println!("  Image size: {}", config.imgsz);
    println!("  Device:     {}", config.device);
    println!();

    let trainer = Trainer::new(services.model.clone()).with_base_model(services.base_model.clone());
    let report = match trainer.train(data, config, &StdoutProgressSink).await {
        Ok(report) => report,
        Err(e) => return Outcome::failed("train", &e),
    };

    println!();
    println!("{}", "Training complete".bold().green());
    println!("  Job:     {}", report.job_id.0.cyan());
    println!("  Run dir: {}", report.layout.run_dir().display());
    println!("  Weights: {}", report.model.weights.display());
    if let Some(manifest) = &report.manifest_path {
        println!("  Manifest: {}", manifest.display().to_string().dimmed());
    }

    match &report.export {
        Ok(artifact) => {
            println!("  ONNX:    {}", artifact.path.display().to_string().cyan());
            println!();
            println!(
                "  {}",
                format!("Copy the ONNX model into the models folder: cp {} models/plate-ocr.onnx", artifact.path.display())
                    .dimmed()
            );
            println!();
            Outcome::Success
        }
        Err(e) => {
            println!();
            eprintln!("{} {}", "⚠ export failed:".yellow().bold(), e);
            eprintln!(
                "  {}",
                format!("Checkpoints are intact; retry with: plate-ocr-export {}", report.model.weights.display()).dimmed()
            );
            println!();
            Outcome::TrainedExportFailed
        }
    }
}
