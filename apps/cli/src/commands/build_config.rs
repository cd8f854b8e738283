//! Dataset descriptor generation command.

use super::Outcome;
use colored::Colorize;
use std::path::Path;

pub fn execute(path: &Path) -> Outcome {
    match plate_ocr_training::build_descriptor(path) {
        Ok(descriptor) => {
            println!();
            println!("{}", "Dataset descriptor created".bold().green());
            println!("  File:    {}", path.display().to_string().cyan());
            println!("  Root:    {}", descriptor.path.display());
            println!("  Classes: {}", descriptor.nc);
            println!();
            println!("  {}", "Next: add images and YOLO label files under the dataset root, then run `plate-ocr`.".dimmed());
            println!();
            Outcome::Success
        }
        Err(e) => Outcome::failed("build-config", &e),
    }
}
