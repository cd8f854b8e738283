use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

pub const DEFAULT_RUNS_ROOT: &str = "runs";
pub const DETECT_TASK: &str = "detect";

/// Filesystem layout of one training run.
///
/// Default layout is `runs/detect/<name>/...` with checkpoints in
/// `weights/{last,best}.pt`. The model service picks the actual run directory
/// (it may suffix the name when the directory already exists); this type only
/// names the files inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    run_dir: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(run_dir: PathBuf) -> Self {
        Self { run_dir }
    }

    /// `<runs_root>/<task>/<name>`
    #[must_use]
    pub fn for_run(runs_root: &Path, task: &str, name: &str) -> Self {
        Self::new(runs_root.join(task).join(name))
    }

    /// The directory a detection run named `name` lands in by default.
    #[must_use]
    pub fn default_for(name: &str) -> Self {
        Self::for_run(Path::new(DEFAULT_RUNS_ROOT), DETECT_TASK, name)
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    #[must_use]
    pub fn weights_dir(&self) -> PathBuf {
        self.run_dir.join("weights")
    }

    #[must_use]
    pub fn last_checkpoint(&self) -> PathBuf {
        self.weights_dir().join("last.pt")
    }

    #[must_use]
    pub fn best_checkpoint(&self) -> PathBuf {
        self.weights_dir().join("best.pt")
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join("training_manifest.json")
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(self.weights_dir())?;
        Ok(())
    }
}
