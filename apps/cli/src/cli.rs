//! Argument surfaces of the two binaries and their translation into a [`Command`].

use crate::commands::Command;
use crate::config::PlateOcrConfig;
use clap::Parser;
use plate_ocr_training::{ExportConfig, ValidationConfig, DEFAULT_DESCRIPTOR_PATH, DEFAULT_EXPORT_NAME};
use std::path::PathBuf;

/// Plate OCR - train, validate and configure the plate character detector
///
/// Without a mode flag the tool trains a model on the dataset described by
/// `--data` and exports it to ONNX.
#[derive(Parser, Debug)]
#[command(
    name = "plate-ocr",
    author,
    version,
    about = "Train, validate and configure the plate character detector"
)]
pub struct Args {
    /// Dataset descriptor file
    #[arg(long, default_value = DEFAULT_DESCRIPTOR_PATH)]
    pub data: PathBuf,

    /// Number of training epochs [default: 100]
    #[arg(long)]
    pub epochs: Option<u32>,

    /// Batch size [default: 16]
    #[arg(long)]
    pub batch: Option<u32>,

    /// Input image size [default: 640]
    #[arg(long = "img-size")]
    pub img_size: Option<u32>,

    /// Write the reference plate-ocr.yaml descriptor and exit
    #[arg(long, conflicts_with = "validate")]
    pub create_yaml: bool,

    /// Validate the given model against `--data` and exit
    #[arg(long, value_name = "MODEL")]
    pub validate: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Configuration file (defaults to ./.plate-ocr.toml and ~/.plate-ocr/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Resolve the selected mode. Flags override values from the config file.
    pub fn into_command(self, config: &PlateOcrConfig) -> Command {
        let imgsz = self.img_size.unwrap_or(config.training.imgsz);

        if self.create_yaml {
            return Command::BuildConfig { path: PathBuf::from(DEFAULT_DESCRIPTOR_PATH) };
        }

        if let Some(model) = self.validate {
            return Command::Validate {
                model,
                data: self.data,
                config: ValidationConfig { imgsz, ..ValidationConfig::default() },
            };
        }

        let mut training = config.training.clone();
        training.imgsz = imgsz;
        if let Some(epochs) = self.epochs {
            training.epochs = epochs;
        }
        if let Some(batch) = self.batch {
            training.batch = batch;
        }

        Command::Train { data: self.data, config: training }
    }
}

/// Plate OCR export - convert a trained model to a static-shape ONNX graph
#[derive(Parser, Debug)]
#[command(
    name = "plate-ocr-export",
    author,
    version,
    about = "Export a trained plate OCR model to ONNX (static shape, opset 12, full precision)"
)]
pub struct ExportArgs {
    /// Trained model weights (.pt)
    pub model: PathBuf,

    /// Output file name, written beside the model
    #[arg(short, long, default_value = DEFAULT_EXPORT_NAME)]
    pub output: String,

    /// Input image size
    #[arg(long = "img-size", default_value_t = 640)]
    pub img_size: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Configuration file (defaults to ./.plate-ocr.toml and ~/.plate-ocr/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ExportArgs {
    pub fn into_command(self) -> Command {
        Command::Export {
            model: self.model,
            config: ExportConfig::for_consumer(self.img_size).with_output_name(self.output),
        }
    }
}
