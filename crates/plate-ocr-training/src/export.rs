//! Export of trained weights into a static-shape ONNX graph.
//!
//! The downstream consumer runs its own pre- and post-processing and only
//! accepts simplified, static-shape, full-precision graphs at opset 12. Those
//! settings are forced on every export, whatever the caller asked for.

use crate::artifacts::sha256_file;
use crate::error::{TrainingError, TrainingResult};
use crate::service::{ModelHandle, ModelService};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const CONSUMER_OPSET: u32 = 12;
pub const DEFAULT_EXPORT_NAME: &str = "model_simple.onnx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Onnx,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub imgsz: u32,
    pub simplify: bool,
    pub dynamic: bool,
    pub opset: u32,
    pub half: bool,
    pub int8: bool,
    /// File name for the artifact, placed beside the source weights.
    /// `None` keeps the service's own naming (`<weights stem>.<ext>`).
    #[serde(skip)]
    pub output_name: Option<String>,
}

impl ExportConfig {
    /// Settings accepted by the downstream consumer.
    #[must_use]
    pub fn for_consumer(imgsz: u32) -> Self {
        Self {
            format: ExportFormat::Onnx,
            imgsz,
            simplify: true,
            dynamic: false,
            opset: CONSUMER_OPSET,
            half: false,
            int8: false,
            output_name: None,
        }
    }

    #[must_use]
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Force the consumer contract onto caller-supplied settings.
    #[must_use]
    pub fn enforce_consumer_contract(self) -> Self {
        let enforced = Self {
            format: self.format,
            output_name: self.output_name.clone(),
            ..Self::for_consumer(self.imgsz)
        };

        if self.simplify != enforced.simplify {
            warn!("ignoring simplify=false; exported graphs are always simplified");
        }
        if self.dynamic {
            warn!("ignoring dynamic=true; exported graphs use static shapes");
        }
        if self.opset != enforced.opset {
            warn!(requested = self.opset, opset = enforced.opset, "ignoring requested opset");
        }
        if self.half || self.int8 {
            warn!(half = self.half, int8 = self.int8, "ignoring reduced precision; exported graphs are full precision");
        }

        enforced
    }
}

/// The deployable graph produced by an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedArtifact {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub sha256: String,
}

#[derive(Clone)]
pub struct Exporter {
    service: Arc<dyn ModelService>,
}

impl Exporter {
    #[must_use]
    pub fn new(service: Arc<dyn ModelService>) -> Self {
        Self { service }
    }

    pub async fn export(&self, model: &ModelHandle, config: &ExportConfig) -> TrainingResult<ExportedArtifact> {
        let config = config.clone().enforce_consumer_contract();
        if config.imgsz == 0 || config.imgsz % 32 != 0 {
            return Err(TrainingError::InvalidSpec(format!(
                "export imgsz must be a positive multiple of 32 (got {})",
                config.imgsz
            )));
        }

        let target = config
            .output_name
            .as_deref()
            .map(|name| requested_path(&model.weights, name, config.format))
            .transpose()?;

        info!(
            service = self.service.id(),
            weights = %model.weights.display(),
            imgsz = config.imgsz,
            opset = config.opset,
            "exporting model"
        );

        let produced = self.service.export(model, &config).await.map_err(TrainingError::into_library)?;
        if !produced.is_file() {
            return Err(TrainingError::Artifact(format!(
                "model service reported {} but no file was written",
                produced.display()
            )));
        }

        let path = match target {
            Some(target) if target != produced => {
                std::fs::rename(&produced, &target)?;
                target
            }
            _ => produced,
        };

        let sha256 = sha256_file(&path)?;
        info!(path = %path.display(), "export complete");
        Ok(ExportedArtifact { path, format: config.format, sha256 })
    }
}

/// Resolve a bare file name to a path beside the source weights.
fn requested_path(weights: &Path, name: &str, format: ExportFormat) -> TrainingResult<PathBuf> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(TrainingError::Configuration(format!(
            "export output name must be a plain file name (got {name:?})"
        )));
    }

    let mut file = PathBuf::from(name);
    match file.extension().and_then(|ext| ext.to_str()) {
        None => {
            file.set_extension(format.extension());
        }
        Some(ext) if ext.eq_ignore_ascii_case(format.extension()) => {}
        Some(ext) => {
            return Err(TrainingError::Configuration(format!(
                "export output name must end in .{} (got .{ext})",
                format.extension()
            )));
        }
    }

    let dir = weights.parent().unwrap_or_else(|| Path::new(""));
    let target = dir.join(file);
    if target == weights {
        return Err(TrainingError::Configuration(format!(
            "export output {} would overwrite the source weights",
            target.display()
        )));
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MockModelService, ServiceCall, ServiceStage};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn model_in(dir: &Path) -> ModelHandle {
        let weights = dir.join("best.pt");
        std::fs::write(&weights, b"weights").unwrap();
        ModelHandle::new(weights, BTreeMap::from([(0, "0".to_string())]))
    }

    #[tokio::test]
    async fn test_export_forces_consumer_contract() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockModelService::new(temp.path()));
        let exporter = Exporter::new(service.clone());

        let requested = ExportConfig {
            simplify: false,
            dynamic: true,
            opset: 17,
            half: true,
            int8: true,
            ..ExportConfig::for_consumer(640)
        };
        exporter.export(&model_in(temp.path()), &requested).await.unwrap();

        let sent = service
            .calls()
            .into_iter()
            .find_map(|c| match c {
                ServiceCall::Export { config, .. } => Some(config),
                _ => None,
            })
            .unwrap();
        assert!(sent.simplify);
        assert!(!sent.dynamic);
        assert_eq!(sent.opset, 12);
        assert!(!sent.half);
        assert!(!sent.int8);
        assert_eq!(sent.imgsz, 640);
    }

    #[tokio::test]
    async fn test_export_without_name_keeps_service_naming() {
        let temp = TempDir::new().unwrap();
        let exporter = Exporter::new(Arc::new(MockModelService::new(temp.path())));

        let artifact = exporter.export(&model_in(temp.path()), &ExportConfig::for_consumer(640)).await.unwrap();

        assert_eq!(artifact.path, temp.path().join("best.onnx"));
        assert!(artifact.path.is_file());
        assert_eq!(artifact.sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_export_honors_custom_output_name() {
        let temp = TempDir::new().unwrap();
        let exporter = Exporter::new(Arc::new(MockModelService::new(temp.path())));

        let config = ExportConfig::for_consumer(640).with_output_name("custom_name.onnx");
        let artifact = exporter.export(&model_in(temp.path()), &config).await.unwrap();

        assert_eq!(artifact.path, temp.path().join("custom_name.onnx"));
        assert!(artifact.path.is_file());
        assert!(!temp.path().join("best.onnx").exists());
    }

    #[tokio::test]
    async fn test_export_appends_missing_extension() {
        let temp = TempDir::new().unwrap();
        let exporter = Exporter::new(Arc::new(MockModelService::new(temp.path())));

        let config = ExportConfig::for_consumer(640).with_output_name("plate");
        let artifact = exporter.export(&model_in(temp.path()), &config).await.unwrap();

        assert_eq!(artifact.path, temp.path().join("plate.onnx"));
    }

    #[tokio::test]
    async fn test_export_rejects_path_like_name_before_contacting_service() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockModelService::new(temp.path()));
        let exporter = Exporter::new(service.clone());

        let config = ExportConfig::for_consumer(640).with_output_name("../escape.onnx");
        let err = exporter.export(&model_in(temp.path()), &config).await.unwrap_err();

        assert!(matches!(err, TrainingError::Configuration(_)));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_export_never_overwrites_source_checkpoint() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockModelService::new(temp.path()));
        let exporter = Exporter::new(service.clone());
        let model = model_in(temp.path());

        for name in ["best.pt", "last.pt", "model.engine"] {
            let config = ExportConfig::for_consumer(640).with_output_name(name);
            let err = exporter.export(&model, &config).await.unwrap_err();
            assert!(matches!(err, TrainingError::Configuration(_)), "{name}: {err:?}");
        }

        assert!(service.calls().is_empty());
        assert_eq!(std::fs::read(&model.weights).unwrap(), b"weights");
    }

    #[tokio::test]
    async fn test_export_rejects_name_equal_to_onnx_weights() {
        let temp = TempDir::new().unwrap();
        let weights = temp.path().join("plate.onnx");
        std::fs::write(&weights, b"graph").unwrap();
        let model = ModelHandle::new(weights.clone(), BTreeMap::from([(0, "0".to_string())]));
        let exporter = Exporter::new(Arc::new(MockModelService::new(temp.path())));

        let config = ExportConfig::for_consumer(640).with_output_name("plate");
        let err = exporter.export(&model, &config).await.unwrap_err();

        assert!(matches!(err, TrainingError::Configuration(_)));
        assert_eq!(std::fs::read(&weights).unwrap(), b"graph");
    }

    #[tokio::test]
    async fn test_export_wraps_service_failure() {
        let temp = TempDir::new().unwrap();
        let service = MockModelService::new(temp.path()).failing(ServiceStage::Export, "onnx not installed");
        let exporter = Exporter::new(Arc::new(service));

        let err = exporter.export(&model_in(temp.path()), &ExportConfig::for_consumer(640)).await.unwrap_err();

        match err {
            TrainingError::Library(msg) => assert!(msg.contains("onnx not installed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
