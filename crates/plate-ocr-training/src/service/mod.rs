//! The model service boundary.
//!
//! All detection mathematics lives behind [`ModelService`]. The orchestration
//! components only hold an `Arc<dyn ModelService>` and exchange explicit
//! config/result values with it, so any backend (or a stub) can be injected.

pub mod mock;
pub mod ultralytics;

pub use mock::{MockModelService, ServiceCall, ServiceStage};
pub use ultralytics::UltralyticsService;

use crate::error::TrainingResult;
use crate::export::ExportConfig;
use crate::job::TrainingConfig;
use crate::validator::ValidationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A loaded detector: its weights on disk plus the class-label mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub weights: PathBuf,
    #[serde(default)]
    pub names: BTreeMap<u32, String>,
}

impl ModelHandle {
    #[must_use]
    pub fn new(weights: PathBuf, names: BTreeMap<u32, String>) -> Self {
        Self { weights, names }
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.names.len()
    }
}

/// What the service reports back after a training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainSummary {
    /// Run directory chosen by the service (`<runs-root>/<task>/<name>`).
    pub save_dir: PathBuf,
    #[serde(default)]
    pub best: Option<PathBuf>,
    #[serde(default)]
    pub last: Option<PathBuf>,
    /// Final scalar metrics as reported by the service, keyed by its own names.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

#[async_trait]
pub trait ModelService: Send + Sync {
    fn id(&self) -> &'static str;

    /// Load weights from disk.
    async fn load(&self, weights: &Path) -> TrainingResult<ModelHandle>;

    /// Train `model` in place on the dataset described by `data`.
    ///
    /// Checkpointing and early stopping are the service's business; on return
    /// the handle points at the checkpoint the service considers final.
    async fn train(
        &self,
        model: &mut ModelHandle,
        data: &Path,
        config: &TrainingConfig,
    ) -> TrainingResult<TrainSummary>;

    /// Export `model` and return the path of the produced artifact.
    async fn export(&self, model: &ModelHandle, config: &ExportConfig) -> TrainingResult<PathBuf>;

    /// Evaluate `model` and return the service's raw result object.
    async fn validate(
        &self,
        model: &ModelHandle,
        data: &Path,
        config: &ValidationConfig,
    ) -> TrainingResult<serde_json::Value>;
}
