use super::{ModelHandle, ModelService, TrainSummary};
use crate::descriptor::DatasetDescriptor;
use crate::error::{TrainingError, TrainingResult};
use crate::export::ExportConfig;
use crate::job::TrainingConfig;
use crate::layout::{RunLayout, DETECT_TASK};
use crate::validator::ValidationConfig;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStage {
    Load,
    Train,
    Export,
    Validate,
}

/// One recorded call into the mock service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Load { weights: PathBuf },
    Train { weights: PathBuf, data: PathBuf, config: TrainingConfig },
    Export { weights: PathBuf, config: ExportConfig },
    Validate { weights: PathBuf, data: PathBuf, config: ValidationConfig },
}

/// A deterministic, in-process model service for testing and demonstration.
///
/// Training writes placeholder checkpoints under `<runs_root>/detect/<name>`,
/// export writes `<weights stem>.onnx` beside the weights, and every call is
/// recorded. Any stage can be scripted to fail.
#[derive(Debug)]
pub struct MockModelService {
    runs_root: PathBuf,
    calls: Mutex<Vec<ServiceCall>>,
    failures: HashMap<ServiceStage, String>,
    validation_result: serde_json::Value,
}

impl MockModelService {
    #[must_use]
    pub fn new(runs_root: &Path) -> Self {
        Self {
            runs_root: runs_root.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            failures: HashMap::new(),
            validation_result: json!({
                "box": {"map50": 0.95, "map": 0.71, "mp": 0.93, "mr": 0.9}
            }),
        }
    }

    #[must_use]
    pub fn failing(mut self, stage: ServiceStage, message: impl Into<String>) -> Self {
        self.failures.insert(stage, message.into());
        self
    }

    #[must_use]
    pub fn with_validation_result(mut self, result: serde_json::Value) -> Self {
        self.validation_result = result;
        self
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: ServiceCall) {
        debug!(?call, "mock model service call");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, stage: ServiceStage) -> TrainingResult<()> {
        match self.failures.get(&stage) {
            Some(message) => Err(TrainingError::Library(message.clone())),
            None => Ok(()),
        }
    }
}

fn placeholder_names() -> BTreeMap<u32, String> {
    DatasetDescriptor::reference().names
}

#[async_trait]
impl ModelService for MockModelService {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn load(&self, weights: &Path) -> TrainingResult<ModelHandle> {
        self.record(ServiceCall::Load { weights: weights.to_path_buf() });
        self.check(ServiceStage::Load)?;
        Ok(ModelHandle::new(weights.to_path_buf(), placeholder_names()))
    }

    async fn train(
        &self,
        model: &mut ModelHandle,
        data: &Path,
        config: &TrainingConfig,
    ) -> TrainingResult<TrainSummary> {
        self.record(ServiceCall::Train {
            weights: model.weights.clone(),
            data: data.to_path_buf(),
            config: config.clone(),
        });
        self.check(ServiceStage::Train)?;

        let layout = RunLayout::for_run(&self.runs_root, DETECT_TASK, &config.name);
        layout.ensure_dirs()?;
        std::fs::write(layout.last_checkpoint(), format!("last:{}", config.epochs))?;
        std::fs::write(layout.best_checkpoint(), format!("best:{}", config.epochs))?;

        model.weights = layout.best_checkpoint();
        if let Ok(descriptor) = DatasetDescriptor::load(data) {
            model.names = descriptor.names;
        }

        Ok(TrainSummary {
            save_dir: layout.run_dir().to_path_buf(),
            best: Some(layout.best_checkpoint()),
            last: Some(layout.last_checkpoint()),
            metrics: BTreeMap::from([("fitness".to_string(), 0.74), ("metrics/mAP50(B)".to_string(), 0.95)]),
        })
    }

    async fn export(&self, model: &ModelHandle, config: &ExportConfig) -> TrainingResult<PathBuf> {
        self.record(ServiceCall::Export { weights: model.weights.clone(), config: config.clone() });
        self.check(ServiceStage::Export)?;

        let path = model.weights.with_extension(config.format.extension());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, format!("graph:{}:{}", config.imgsz, config.opset))?;
        Ok(path)
    }

    async fn validate(
        &self,
        model: &ModelHandle,
        data: &Path,
        config: &ValidationConfig,
    ) -> TrainingResult<serde_json::Value> {
        self.record(ServiceCall::Validate {
            weights: model.weights.clone(),
            data: data.to_path_buf(),
            config: config.clone(),
        });
        self.check(ServiceStage::Validate)?;
        Ok(self.validation_result.clone())
    }
}
