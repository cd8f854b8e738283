//! Model service backed by the Ultralytics YOLO runtime.
//!
//! Each call spawns `<python> -c <bridge> <request-json> <response-file>`.
//! The child inherits stdout/stderr so the runtime's own progress output stays
//! visible; the structured answer comes back through the response file.

use super::{ModelHandle, ModelService, TrainSummary};
use crate::error::{TrainingError, TrainingResult};
use crate::export::ExportConfig;
use crate::job::TrainingConfig;
use crate::validator::ValidationConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const BRIDGE: &str = include_str!("bridge.py");

pub const DEFAULT_PYTHON: &str = "python3";

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoadedModel {
    weights: PathBuf,
    #[serde(default)]
    names: BTreeMap<u32, String>,
}

#[derive(Debug, Deserialize)]
struct TrainedModel {
    #[serde(flatten)]
    summary: TrainSummary,
    weights: PathBuf,
    #[serde(default)]
    names: BTreeMap<u32, String>,
}

#[derive(Debug, Deserialize)]
struct ExportedPath {
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UltralyticsService {
    python: String,
}

impl Default for UltralyticsService {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl UltralyticsService {
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }

    #[must_use]
    pub fn python(&self) -> &str {
        &self.python
    }

    async fn call(&self, request: Value) -> TrainingResult<Value> {
        let op = request["op"].as_str().unwrap_or_default().to_string();
        let response_file = tempfile::NamedTempFile::new()?;
        debug!(python = %self.python, %op, "invoking ultralytics bridge");

        let status = Command::new(&self.python)
            .arg("-c")
            .arg(BRIDGE)
            .arg(serde_json::to_string(&request)?)
            .arg(response_file.path())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TrainingError::Library(format!("python interpreter not found: {}", self.python))
                } else {
                    TrainingError::Library(format!("failed to start {}: {e}", self.python))
                }
            })?;

        let body = std::fs::read_to_string(response_file.path())?;
        if body.trim().is_empty() {
            return Err(TrainingError::Library(format!("ultralytics {op} exited with {status} and no response")));
        }

        let response: BridgeResponse = serde_json::from_str(&body)
            .map_err(|e| TrainingError::Library(format!("unreadable response from ultralytics {op}: {e}")))?;
        if !response.ok {
            return Err(TrainingError::Library(
                response.error.unwrap_or_else(|| format!("ultralytics {op} failed ({status})")),
            ));
        }

        Ok(response.result)
    }
}

fn decode<T: serde::de::DeserializeOwned>(op: &str, value: Value) -> TrainingResult<T> {
    serde_json::from_value(value)
        .map_err(|e| TrainingError::Library(format!("unexpected ultralytics {op} result: {e}")))
}

#[async_trait]
impl ModelService for UltralyticsService {
    fn id(&self) -> &'static str {
        "ultralytics"
    }

    async fn load(&self, weights: &Path) -> TrainingResult<ModelHandle> {
        // Bare names such as `yolo11n.pt` may be fetched by the runtime itself.
        let has_dir = weights.parent().is_some_and(|p| !p.as_os_str().is_empty());
        if has_dir && !weights.exists() {
            return Err(TrainingError::Library(format!("model weights not found: {}", weights.display())));
        }

        let result = self.call(json!({"op": "load", "model": weights})).await?;
        let loaded: LoadedModel = decode("load", result)?;
        Ok(ModelHandle::new(loaded.weights, loaded.names))
    }

    async fn train(
        &self,
        model: &mut ModelHandle,
        data: &Path,
        config: &TrainingConfig,
    ) -> TrainingResult<TrainSummary> {
        let request = json!({
            "op": "train",
            "model": model.weights,
            "data": data,
            "args": config,
        });

        let trained: TrainedModel = decode("train", self.call(request).await?)?;
        model.weights = trained.weights;
        if !trained.names.is_empty() {
            model.names = trained.names;
        }
        Ok(trained.summary)
    }

    async fn export(&self, model: &ModelHandle, config: &ExportConfig) -> TrainingResult<PathBuf> {
        let request = json!({
            "op": "export",
            "model": model.weights,
            "args": config,
        });

        let exported: ExportedPath = decode("export", self.call(request).await?)?;
        Ok(exported.path)
    }

    async fn validate(
        &self,
        model: &ModelHandle,
        data: &Path,
        config: &ValidationConfig,
    ) -> TrainingResult<Value> {
        let request = json!({
            "op": "val",
            "model": model.weights,
            "data": data,
            "args": config,
        });

        self.call(request).await
    }
}
