use crate::descriptor::DatasetDescriptor;
use crate::error::{TrainingError, TrainingResult};
use crate::service::{ModelHandle, ModelService};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub imgsz: u32,
    pub batch: u32,
    pub save_json: bool,
    pub save_hybrid: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { imgsz: 640, batch: 16, save_json: true, save_hybrid: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub map50: f64,
    pub map50_95: f64,
    pub precision: f64,
    pub recall: f64,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mAP@50:    {:.4}", self.map50)?;
        writeln!(f, "mAP@50-95: {:.4}", self.map50_95)?;
        writeln!(f, "Precision: {:.4}", self.precision)?;
        write!(f, "Recall:    {:.4}", self.recall)
    }
}

#[derive(Clone)]
pub struct Validator {
    service: Arc<dyn ModelService>,
    config: ValidationConfig,
}

impl Validator {
    #[must_use]
    pub fn new(service: Arc<dyn ModelService>) -> Self {
        Self { service, config: ValidationConfig::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub async fn validate(&self, model: &ModelHandle, descriptor: &Path) -> TrainingResult<ValidationResult> {
        DatasetDescriptor::load(descriptor)?;

        info!(
            service = self.service.id(),
            weights = %model.weights.display(),
            data = %descriptor.display(),
            imgsz = self.config.imgsz,
            "validating model"
        );

        let raw = self
            .service
            .validate(model, descriptor, &self.config)
            .await
            .map_err(TrainingError::into_library)?;
        extract_metrics(&raw)
    }

    /// Load `weights` and validate it. The descriptor is checked first so a
    /// bad path never reaches the model service.
    pub async fn validate_checkpoint(&self, weights: &Path, descriptor: &Path) -> TrainingResult<ValidationResult> {
        DatasetDescriptor::load(descriptor)?;
        let model = self.service.load(weights).await.map_err(TrainingError::into_library)?;
        self.validate(&model, descriptor).await
    }
}

/// Pull the four box metrics out of the service's result object.
///
/// Precision and recall may arrive as scalars (`mp`, `mr`) or as per-class
/// arrays (`p`, `r`), in which case the class mean is used.
pub fn extract_metrics(raw: &Value) -> TrainingResult<ValidationResult> {
    let metrics = raw
        .get("box")
        .ok_or_else(|| TrainingError::Library("validation result has no `box` metrics".to_string()))?;

    Ok(ValidationResult {
        map50: scalar(metrics, "map50")?,
        map50_95: scalar(metrics, "map")?,
        precision: scalar_or_mean(metrics, "mp", "p")?,
        recall: scalar_or_mean(metrics, "mr", "r")?,
    })
}

fn scalar(metrics: &Value, field: &str) -> TrainingResult<f64> {
    metrics
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| TrainingError::Library(format!("validation result is missing box.{field}")))
}

fn scalar_or_mean(metrics: &Value, scalar_field: &str, per_class_field: &str) -> TrainingResult<f64> {
    if let Some(v) = metrics.get(scalar_field).and_then(Value::as_f64) {
        return Ok(v);
    }

    match metrics.get(per_class_field) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| TrainingError::Library(format!("box.{per_class_field} is not a number"))),
        Some(Value::Array(values)) if !values.is_empty() => {
            let mut sum = 0.0;
            for v in values {
                sum += v.as_f64().ok_or_else(|| {
                    TrainingError::Library(format!("box.{per_class_field} contains a non-numeric value"))
                })?;
            }
            Ok(sum / values.len() as f64)
        }
        Some(Value::Array(_)) => Err(TrainingError::Library(format!(
            "validation result has no per-class values in box.{per_class_field}"
        ))),
        _ => Err(TrainingError::Library(format!(
            "validation result is missing box.{scalar_field} and box.{per_class_field}"
        ))),
    }
}
