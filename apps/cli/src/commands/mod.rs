//! Command dispatch for the plate OCR tools.
//!
//! Each invocation resolves to exactly one [`Command`]; [`dispatch`] runs it
//! and folds every stage error into an [`Outcome`], which decides the exit
//! status.

pub mod build_config;
pub mod export;
pub mod train;
pub mod validate;

use crate::config::PlateOcrConfig;
use colored::Colorize;
use plate_ocr_training::{
    ExportConfig, ModelService, TrainingConfig, TrainingError, UltralyticsService, ValidationConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BuildConfig { path: PathBuf },
    Validate { model: PathBuf, data: PathBuf, config: ValidationConfig },
    Export { model: PathBuf, config: ExportConfig },
    Train { data: PathBuf, config: TrainingConfig },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BuildConfig { .. } => "build-config",
            Self::Validate { .. } => "validate",
            Self::Export { .. } => "export",
            Self::Train { .. } => "train",
        }
    }
}

/// Capabilities a command may use.
#[derive(Clone)]
pub struct Services {
    pub model: Arc<dyn ModelService>,
    pub base_model: PathBuf,
}

impl Services {
    pub fn new(model: Arc<dyn ModelService>, base_model: PathBuf) -> Self {
        Self { model, base_model }
    }

    pub fn from_config(config: &PlateOcrConfig) -> Self {
        Self::new(Arc::new(UltralyticsService::new(config.python())), config.base_model())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Training finished and checkpoints exist, but the chained export failed.
    TrainedExportFailed,
    Failed { stage: &'static str, kind: &'static str, message: String },
}

impl Outcome {
    pub fn failed(stage: &'static str, err: &TrainingError) -> Self {
        Self::Failed { stage, kind: err.kind(), message: err.to_string() }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failed { .. } => 1,
            Self::TrainedExportFailed => 3,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

pub async fn dispatch(command: Command, services: &Services) -> Outcome {
    let stage = command.name();
    let outcome = match command {
        Command::BuildConfig { path } => build_config::execute(&path),
        Command::Validate { model, data, config } => validate::execute(&model, &data, config, services).await,
        Command::Export { model, config } => export::execute(&model, &config, services).await,
        Command::Train { data, config } => train::execute(&data, &config, services).await,
    };

    if let Outcome::Failed { kind, message, .. } = &outcome {
        debug!(stage, kind, "{message}");
        eprintln!("{} {}", format!("✗ {stage} failed:").red().bold(), message);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_ocr_training::{MockModelService, ServiceCall, ServiceStage, DEFAULT_BASE_MODEL};
    use tempfile::TempDir;

    fn services(mock: MockModelService) -> (Arc<MockModelService>, Services) {
        let mock = Arc::new(mock);
        let services = Services::new(mock.clone(), PathBuf::from(DEFAULT_BASE_MODEL));
        (mock, services)
    }

    fn small_training() -> TrainingConfig {
        TrainingConfig { epochs: 2, batch: 2, imgsz: 320, ..Default::default() }
    }

    #[tokio::test]
    async fn test_build_config_succeeds() {
        let temp = TempDir::new().unwrap();
        let (_, services) = services(MockModelService::new(temp.path()));
        let path = temp.path().join("plate-ocr.yaml");

        let outcome = dispatch(Command::BuildConfig { path: path.clone() }, &services).await;

        assert_eq!(outcome.exit_code(), 0);
        assert!(std::fs::read_to_string(path).unwrap().contains("nc: 34"));
    }

    #[tokio::test]
    async fn test_train_with_missing_descriptor_exits_non_zero() {
        let temp = TempDir::new().unwrap();
        let (mock, services) = services(MockModelService::new(temp.path()));

        let command = Command::Train { data: temp.path().join("missing.yaml"), config: small_training() };
        let outcome = dispatch(command, &services).await;

        assert!(matches!(outcome, Outcome::Failed { stage: "train", kind: "configuration", .. }));
        assert_ne!(outcome.exit_code(), 0);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_train_success_exits_zero() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        plate_ocr_training::build_descriptor(&data).unwrap();
        let (_, services) = services(MockModelService::new(temp.path()));

        let outcome = dispatch(Command::Train { data, config: small_training() }, &services).await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_train_with_failed_export_is_distinct_non_zero() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        plate_ocr_training::build_descriptor(&data).unwrap();
        let (_, services) = services(MockModelService::new(temp.path()).failing(ServiceStage::Export, "boom"));

        let outcome = dispatch(Command::Train { data, config: small_training() }, &services).await;
        assert_eq!(outcome, Outcome::TrainedExportFailed);
        assert_eq!(outcome.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_validate_outcomes() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        plate_ocr_training::build_descriptor(&data).unwrap();
        let command = Command::Validate {
            model: PathBuf::from("best.pt"),
            data: data.clone(),
            config: ValidationConfig::default(),
        };

        let (_, ok) = services(MockModelService::new(temp.path()));
        assert_eq!(dispatch(command.clone(), &ok).await.exit_code(), 0);

        let (_, failing) = services(MockModelService::new(temp.path()).failing(ServiceStage::Validate, "bad shape"));
        assert_eq!(dispatch(command, &failing).await.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_export_writes_requested_name() {
        let temp = TempDir::new().unwrap();
        let weights = temp.path().join("best.pt");
        std::fs::write(&weights, b"weights").unwrap();
        let (mock, services) = services(MockModelService::new(temp.path()));

        let command = Command::Export {
            model: weights.clone(),
            config: ExportConfig::for_consumer(640).with_output_name("custom_name.onnx"),
        };
        let outcome = dispatch(command, &services).await;

        assert!(outcome.is_success());
        assert!(temp.path().join("custom_name.onnx").is_file());
        assert_eq!(mock.calls()[0], ServiceCall::Load { weights });
    }

    #[tokio::test]
    async fn test_export_load_failure_exits_non_zero() {
        let temp = TempDir::new().unwrap();
        let (_, services) = services(MockModelService::new(temp.path()).failing(ServiceStage::Load, "not a model"));

        let command = Command::Export {
            model: temp.path().join("best.pt"),
            config: ExportConfig::for_consumer(640),
        };
        let outcome = dispatch(command, &services).await;

        assert!(matches!(outcome, Outcome::Failed { kind: "library", .. }));
        assert_eq!(outcome.exit_code(), 1);
    }
}
