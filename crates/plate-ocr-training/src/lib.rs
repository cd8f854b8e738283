//! Plate OCR Training
//!
//! Orchestration for the plate-character detector:
//! - Writing and checking the dataset descriptor (`build_descriptor`)
//! - Training a base model and chaining an export (`Trainer`)
//! - Exporting static-shape ONNX graphs (`Exporter`)
//! - Validating checkpoints (`Validator`)
//!
//! The detection runtime itself sits behind the `ModelService` trait.

pub mod artifacts;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod job;
pub mod layout;
pub mod progress;
pub mod service;
pub mod trainer;
pub mod validator;

pub use artifacts::{ArtifactKind, TrainingArtifact, TrainingManifest};
pub use descriptor::{build_descriptor, DatasetDescriptor, ImageDirs, DEFAULT_DESCRIPTOR_PATH, PLATE_LABELS};
pub use error::{TrainingError, TrainingResult};
pub use export::{ExportConfig, ExportFormat, ExportedArtifact, Exporter, CONSUMER_OPSET, DEFAULT_EXPORT_NAME};
pub use job::{Augmentation, LrSchedule, Optimizer, TrainingConfig, TrainingDevice, TrainingJobId, DEFAULT_BASE_MODEL};
pub use layout::RunLayout;
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink};
pub use service::{MockModelService, ModelHandle, ModelService, ServiceCall, ServiceStage, TrainSummary, UltralyticsService};
pub use trainer::{Trainer, TrainingReport};
pub use validator::{ValidationConfig, ValidationResult, Validator};
