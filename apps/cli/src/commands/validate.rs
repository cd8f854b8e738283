//! Model validation command.

use super::{Outcome, Services};
use colored::Colorize;
use plate_ocr_training::{ValidationConfig, Validator};
use std::path::Path;

/// Validate `model` against the dataset described by `data` and print the
/// four box metrics.
pub async fn execute(model: &Path, data: &Path, config: ValidationConfig, services: &Services) -> Outcome {
    println!();
    println!("{} {}", "Validating".bold().cyan(), model.display());

    let validator = Validator::new(services.model.clone()).with_config(config);
    match validator.validate_checkpoint(model, data).await {
        Ok(result) => {
            println!();
            println!("{}", "Validation results".bold().green());
            for line in result.to_string().lines() {
                println!("  {line}");
            }
            println!();
            Outcome::Success
        }
        Err(e) => Outcome::failed("validate", &e),
    }
}
