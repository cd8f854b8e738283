use crate::error::{TrainingError, TrainingResult};
use crate::job::{TrainingConfig, TrainingJobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BestCheckpoint,
    LastCheckpoint,
    ExportedGraph,
    Descriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

/// Record of a finished training run, written into its run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub job_id: TrainingJobId,
    pub created_at: DateTime<Utc>,
    pub service: String,
    pub base_model: PathBuf,
    pub descriptor: PathBuf,
    pub config: TrainingConfig,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<TrainingArtifact>,
    /// Set when training succeeded but the chained export did not.
    #[serde(default)]
    pub export_error: Option<String>,
}

impl TrainingManifest {
    pub fn write(&self, path: &Path) -> TrainingResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(path: &Path) -> TrainingResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[must_use]
    pub fn artifact(&self, kind: &ArtifactKind) -> Option<&TrainingArtifact> {
        self.artifacts.iter().find(|a| &a.kind == kind)
    }
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(kind: ArtifactKind, path: PathBuf) -> TrainingResult<TrainingArtifact> {
    if !path.exists() {
        return Err(TrainingError::Artifact(format!(
            "artifact path does not exist: {}",
            path.display()
        )));
    }

    let hash = sha256_file(&path)?;
    Ok(TrainingArtifact { kind, path, sha256: hash })
}
