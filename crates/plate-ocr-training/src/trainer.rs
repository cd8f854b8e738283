use crate::artifacts::{make_artifact, ArtifactKind, TrainingArtifact, TrainingManifest};
use crate::descriptor::DatasetDescriptor;
use crate::error::{TrainingError, TrainingResult};
use crate::export::{ExportConfig, ExportedArtifact, Exporter};
use crate::job::{TrainingConfig, TrainingJobId, DEFAULT_BASE_MODEL};
use crate::layout::RunLayout;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::service::{ModelHandle, ModelService, TrainSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a successful training run.
///
/// Training success is independent of the chained export: `export` carries
/// its own result and never turns a finished run into a failure.
#[derive(Debug)]
pub struct TrainingReport {
    pub job_id: TrainingJobId,
    pub model: ModelHandle,
    pub layout: RunLayout,
    pub summary: TrainSummary,
    pub export: TrainingResult<ExportedArtifact>,
    /// `None` when the manifest could not be written.
    pub manifest_path: Option<PathBuf>,
}

impl TrainingReport {
    #[must_use]
    pub fn export_succeeded(&self) -> bool {
        self.export.is_ok()
    }
}

/// Drives a training run against the model service and exports the result.
#[derive(Clone)]
pub struct Trainer {
    service: Arc<dyn ModelService>,
    exporter: Exporter,
    base_model: PathBuf,
}

impl Trainer {
    #[must_use]
    pub fn new(service: Arc<dyn ModelService>) -> Self {
        Self { exporter: Exporter::new(service.clone()), service, base_model: PathBuf::from(DEFAULT_BASE_MODEL) }
    }

    #[must_use]
    pub fn with_base_model(mut self, base_model: PathBuf) -> Self {
        self.base_model = base_model;
        self
    }

    #[must_use]
    pub fn base_model(&self) -> &Path {
        &self.base_model
    }

    pub async fn train(
        &self,
        descriptor: &Path,
        config: &TrainingConfig,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingReport> {
        let job_id = TrainingJobId::new();
        progress.on_event(ProgressEvent::Started { job_id: job_id.clone() });

        match self.run(&job_id, descriptor, config, progress).await {
            Ok(report) => {
                progress.on_event(ProgressEvent::Finished { job_id });
                Ok(report)
            }
            Err(e) => {
                debug!(%job_id, kind = e.kind(), error = %e, "training failed");
                progress.on_event(ProgressEvent::Failed { job_id, error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job_id: &TrainingJobId,
        descriptor: &Path,
        config: &TrainingConfig,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingReport> {
        // Nothing reaches the service until the inputs check out.
        let dataset = DatasetDescriptor::load(descriptor)?;
        config.validate()?;

        let message = |message: String| {
            progress.on_event(ProgressEvent::Message { job_id: job_id.clone(), message });
        };

        info!(
            %job_id,
            service = self.service.id(),
            data = %descriptor.display(),
            classes = dataset.nc,
            epochs = config.epochs,
            batch = config.batch,
            imgsz = config.imgsz,
            "starting training"
        );

        message(format!("loading base model {}", self.base_model.display()));
        let mut model = self.service.load(&self.base_model).await.map_err(TrainingError::into_library)?;

        message(format!("training for up to {} epochs (patience {})", config.epochs, config.patience));
        let summary = self
            .service
            .train(&mut model, descriptor, config)
            .await
            .map_err(TrainingError::into_library)?;
        let layout = RunLayout::new(summary.save_dir.clone());
        info!(%job_id, run_dir = %layout.run_dir().display(), weights = %model.weights.display(), "training complete");

        message("exporting ONNX graph".to_string());
        let export = self.exporter.export(&model, &ExportConfig::for_consumer(config.imgsz)).await;
        if let Err(e) = &export {
            warn!(%job_id, error = %e, "training succeeded but export failed");
            message(format!("export failed: {e}"));
        }

        let manifest = self.manifest(job_id, descriptor, config, &summary, &export);
        let manifest_path = layout.manifest_path();
        let manifest_path = match manifest.write(&manifest_path) {
            Ok(()) => Some(manifest_path),
            Err(e) => {
                warn!(%job_id, path = %manifest_path.display(), error = %e, "could not write training manifest");
                None
            }
        };

        Ok(TrainingReport { job_id: job_id.clone(), model, layout, summary, export, manifest_path })
    }

    fn manifest(
        &self,
        job_id: &TrainingJobId,
        descriptor: &Path,
        config: &TrainingConfig,
        summary: &TrainSummary,
        export: &TrainingResult<ExportedArtifact>,
    ) -> TrainingManifest {
        let mut artifacts = Vec::new();
        let inputs = [
            (ArtifactKind::Descriptor, Some(descriptor.to_path_buf())),
            (ArtifactKind::BestCheckpoint, summary.best.clone()),
            (ArtifactKind::LastCheckpoint, summary.last.clone()),
        ];
        for (kind, path) in inputs {
            if let Some(path) = path {
                match make_artifact(kind, path.clone()) {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping file in manifest"),
                }
            }
        }
        if let Ok(exported) = export {
            artifacts.push(TrainingArtifact {
                kind: ArtifactKind::ExportedGraph,
                path: exported.path.clone(),
                sha256: exported.sha256.clone(),
            });
        }

        TrainingManifest {
            job_id: job_id.clone(),
            created_at: chrono::Utc::now(),
            service: self.service.id().to_string(),
            base_model: self.base_model.clone(),
            descriptor: descriptor.to_path_buf(),
            config: config.clone(),
            metrics: summary.metrics.clone(),
            artifacts,
            export_error: export.as_ref().err().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::build_descriptor;
    use crate::service::{MockModelService, ServiceCall, ServiceStage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig { epochs: 3, batch: 4, imgsz: 320, ..Default::default() }
    }

    #[tokio::test]
    async fn test_missing_descriptor_never_contacts_service() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockModelService::new(temp.path()));
        let trainer = Trainer::new(service.clone());
        let sink = RecordingSink::default();

        let err = trainer.train(&temp.path().join("nope.yaml"), &small_config(), &sink).await.unwrap_err();

        assert!(matches!(err, TrainingError::Configuration(_)));
        assert!(service.calls().is_empty());
        assert!(matches!(sink.events.lock().unwrap().last(), Some(ProgressEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config_never_contacts_service() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        build_descriptor(&data).unwrap();
        let service = Arc::new(MockModelService::new(temp.path()));
        let trainer = Trainer::new(service.clone());

        let config = TrainingConfig { batch: 0, ..small_config() };
        let err = trainer.train(&data, &config, &RecordingSink::default()).await.unwrap_err();

        assert!(matches!(err, TrainingError::InvalidSpec(_)));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_train_runs_stages_in_order_and_exports() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        build_descriptor(&data).unwrap();
        let service = Arc::new(MockModelService::new(temp.path()));
        let trainer = Trainer::new(service.clone());

        let report = trainer.train(&data, &small_config(), &RecordingSink::default()).await.unwrap();

        let calls = service.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], ServiceCall::Load { weights: PathBuf::from(DEFAULT_BASE_MODEL) });
        match &calls[1] {
            ServiceCall::Train { data: sent, config, .. } => {
                assert_eq!(sent, &data);
                assert_eq!(config, &small_config());
            }
            other => panic!("expected train, got {other:?}"),
        }
        match &calls[2] {
            ServiceCall::Export { weights, config } => {
                assert_eq!(weights, &report.layout.best_checkpoint());
                assert_eq!(config.imgsz, 320);
                assert!(!config.dynamic);
            }
            other => panic!("expected export, got {other:?}"),
        }

        assert!(report.export_succeeded());
        let exported = report.export.as_ref().unwrap();
        assert_eq!(exported.path, report.layout.weights_dir().join("best.onnx"));
    }

    #[tokio::test]
    async fn test_export_failure_keeps_training_success() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        build_descriptor(&data).unwrap();
        let service = MockModelService::new(temp.path()).failing(ServiceStage::Export, "exporter crashed");
        let trainer = Trainer::new(Arc::new(service));
        let sink = RecordingSink::default();

        let report = trainer.train(&data, &small_config(), &sink).await.unwrap();

        assert!(!report.export_succeeded());
        assert!(report.layout.best_checkpoint().is_file());
        assert!(matches!(sink.events.lock().unwrap().last(), Some(ProgressEvent::Finished { .. })));

        let manifest = TrainingManifest::read(report.manifest_path.as_ref().unwrap()).unwrap();
        assert!(manifest.export_error.as_deref().unwrap().contains("exporter crashed"));
        assert!(manifest.artifact(&ArtifactKind::ExportedGraph).is_none());
    }

    #[tokio::test]
    async fn test_service_training_failure_is_library_error() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        build_descriptor(&data).unwrap();
        let service = Arc::new(MockModelService::new(temp.path()).failing(ServiceStage::Train, "CUDA out of memory"));
        let trainer = Trainer::new(service.clone());

        let err = trainer.train(&data, &small_config(), &RecordingSink::default()).await.unwrap_err();

        assert!(matches!(err, TrainingError::Library(_)));
        assert!(!service.calls().iter().any(|c| matches!(c, ServiceCall::Export { .. })));
    }

    #[tokio::test]
    async fn test_manifest_records_checkpoints_and_export() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("plate-ocr.yaml");
        build_descriptor(&data).unwrap();
        let trainer = Trainer::new(Arc::new(MockModelService::new(temp.path())))
            .with_base_model(PathBuf::from("weights/base.pt"));

        let report = trainer.train(&data, &small_config(), &RecordingSink::default()).await.unwrap();
        let manifest = TrainingManifest::read(report.manifest_path.as_ref().unwrap()).unwrap();

        assert_eq!(manifest.job_id, report.job_id);
        assert_eq!(manifest.base_model, PathBuf::from("weights/base.pt"));
        let recorded = manifest.artifact(&ArtifactKind::Descriptor).unwrap();
        assert_eq!(recorded.path, data);
        assert_eq!(recorded.sha256, crate::artifacts::sha256_file(&data).unwrap());
        assert!(manifest.artifact(&ArtifactKind::BestCheckpoint).is_some());
        assert!(manifest.artifact(&ArtifactKind::LastCheckpoint).is_some());
        assert!(manifest.artifact(&ArtifactKind::ExportedGraph).is_some());
        assert!(manifest.metrics.contains_key("fitness"));
    }
}
