use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Well-known location of the descriptor, relative to the working directory.
pub const DEFAULT_DESCRIPTOR_PATH: &str = "plate-ocr.yaml";

/// Class labels of the plate alphabet, in class-index order:
/// ten digits, the 23 plate letters, and the regional marker.
pub const PLATE_LABELS: [&str; 34] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    "الف", "ب", "پ", "ت", "ث", "ج", "د", "ز", "س", "ش", "ص", "ط", "ع", "ف", "ق", "ک", "گ", "ل",
    "م", "ن", "و", "ه", "ی",
    "ایران",
];

/// Dataset configuration consumed by the model service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    /// Dataset root; `train` and `val` are relative to it.
    pub path: PathBuf,
    pub train: ImageDirs,
    pub val: ImageDirs,
    pub nc: usize,
    pub names: BTreeMap<u32, String>,
}

/// Image directories of one split: a single directory or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageDirs {
    Single(String),
    List(Vec<String>),
}

impl ImageDirs {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let dirs: &[String] = match self {
            Self::Single(dir) => std::slice::from_ref(dir),
            Self::List(dirs) => dirs,
        };
        dirs.iter().map(String::as_str)
    }

    /// True when no non-blank directory is named.
    pub fn is_empty(&self) -> bool {
        self.iter().all(|dir| dir.trim().is_empty())
    }
}

impl From<&str> for ImageDirs {
    fn from(dir: &str) -> Self {
        Self::Single(dir.to_string())
    }
}

impl fmt::Display for ImageDirs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(dir) => f.write_str(dir),
            Self::List(dirs) => write!(f, "[{}]", dirs.join(", ")),
        }
    }
}

/// Class names are accepted either as an index mapping or as a plain list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNames {
    Map(BTreeMap<u32, String>),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    path: Option<PathBuf>,
    train: ImageDirs,
    val: ImageDirs,
    #[serde(default)]
    nc: Option<usize>,
    names: RawNames,
}

impl DatasetDescriptor {
    /// The reference descriptor for the plate alphabet.
    #[must_use]
    pub fn reference() -> Self {
        let names = PLATE_LABELS
            .iter()
            .enumerate()
            .map(|(idx, label)| (idx as u32, (*label).to_string()))
            .collect::<BTreeMap<_, _>>();

        Self {
            path: PathBuf::from("./dataset"),
            train: ImageDirs::from("train/images"),
            val: ImageDirs::from("val/images"),
            nc: names.len(),
            names,
        }
    }

    /// Load a descriptor from disk and check its shape.
    ///
    /// Only the file itself is inspected; the image and label directories it
    /// references are left for the model service to resolve.
    pub fn load(path: &Path) -> TrainingResult<Self> {
        if !path.is_file() {
            return Err(TrainingError::Configuration(format!(
                "dataset descriptor not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let raw: RawDescriptor = serde_yaml::from_str(&contents).map_err(|e| {
            TrainingError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })?;

        let names = match raw.names {
            RawNames::Map(map) => map,
            RawNames::List(list) => {
                list.into_iter().enumerate().map(|(idx, name)| (idx as u32, name)).collect()
            }
        };

        let descriptor = Self {
            path: raw.path.unwrap_or_else(|| PathBuf::from(".")),
            train: raw.train,
            val: raw.val,
            nc: raw.nc.unwrap_or(names.len()),
            names,
        };
        descriptor.validate()?;

        debug!(path = %path.display(), nc = descriptor.nc, "loaded dataset descriptor");
        Ok(descriptor)
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.nc == 0 {
            return Err(TrainingError::Configuration("nc must be >= 1".to_string()));
        }
        if self.names.len() != self.nc {
            return Err(TrainingError::Configuration(format!(
                "nc is {} but {} class names are declared",
                self.nc,
                self.names.len()
            )));
        }
        for (expected, idx) in self.names.keys().enumerate() {
            if *idx as usize != expected {
                return Err(TrainingError::Configuration(format!(
                    "class indices must be contiguous from 0 (missing index {expected})"
                )));
            }
        }
        if self.train.is_empty() || self.val.is_empty() {
            return Err(TrainingError::Configuration("train and val paths are required".to_string()));
        }
        Ok(())
    }

    /// Render the descriptor in its canonical, commented form.
    #[must_use]
    pub fn to_yaml(&self) -> String {
        let mut out = String::new();
        out.push_str("# YOLO dataset for plate character recognition\n\n");
        out.push_str("# Paths\n");
        let _ = writeln!(out, "path: {}  # dataset root", self.path.display());
        let _ = writeln!(out, "train: {}  # training images", self.train);
        let _ = writeln!(out, "val: {}  # validation images", self.val);
        out.push_str("\n# Number of classes\n");
        let _ = writeln!(out, "nc: {}", self.nc);
        out.push_str("\n# Class names (digits + plate letters)\n");
        out.push_str("names:\n");
        for (idx, name) in &self.names {
            let _ = writeln!(out, "  {idx}: '{}'", name.replace('\'', "''"));
        }
        out.push_str(DATASET_NOTES);
        out
    }
}

const DATASET_NOTES: &str = "
# Notes:
# - every image needs a YOLO label file with the same stem
# - label line format: class x_center y_center width height (normalized 0-1)
# - expected layout:
#   dataset/
#   ├── train/
#   │   ├── images/
#   │   │   ├── img1.jpg
#   │   │   └── ...
#   │   └── labels/
#   │       ├── img1.txt
#   │       └── ...
#   └── val/
#       ├── images/
#       └── labels/
";

/// Write the reference descriptor to `path`, replacing any existing file.
pub fn build_descriptor(path: &Path) -> TrainingResult<DatasetDescriptor> {
    let descriptor = DatasetDescriptor::reference();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, descriptor.to_yaml())?;

    info!(path = %path.display(), nc = descriptor.nc, "wrote dataset descriptor");
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reference_names_match_nc() {
        let d = DatasetDescriptor::reference();
        assert_eq!(d.nc, 34);
        assert_eq!(d.names.len(), d.nc);
        assert_eq!(d.names.get(&33).map(String::as_str), Some("ایران"));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_build_descriptor_writes_canonical_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_DESCRIPTOR_PATH);

        build_descriptor(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();

        assert!(contents.contains("path: ./dataset"));
        assert!(contents.contains("nc: 34"));
        let last_name = contents
            .lines()
            .filter(|l| l.starts_with("  ") && l.contains(": '"))
            .last()
            .unwrap();
        assert_eq!(last_name.trim(), "33: 'ایران'");
    }

    #[test]
    fn test_build_descriptor_is_idempotent_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plate-ocr.yaml");
        std::fs::write(&path, "stale").unwrap();

        build_descriptor(&path).unwrap();
        let first = std::fs::read(&path).unwrap();
        build_descriptor(&path).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, b"stale");
    }

    #[test]
    fn test_generated_descriptor_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plate-ocr.yaml");
        build_descriptor(&path).unwrap();

        let loaded = DatasetDescriptor::load(&path).unwrap();
        assert_eq!(loaded, DatasetDescriptor::reference());
    }

    #[test]
    fn test_load_accepts_name_list_without_nc() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("list.yaml");
        std::fs::write(&path, "train: a\nval: b\nnames: ['x', 'y', 'z']\n").unwrap();

        let loaded = DatasetDescriptor::load(&path).unwrap();
        assert_eq!(loaded.nc, 3);
        assert_eq!(loaded.names[&2], "z");
    }

    #[test]
    fn test_load_accepts_directory_lists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("multi.yaml");
        std::fs::write(
            &path,
            "path: ./dataset\ntrain: [train/images, extra/images]\nval:\n  - val/images\nnames: ['x', 'y']\n",
        )
        .unwrap();

        let loaded = DatasetDescriptor::load(&path).unwrap();
        assert_eq!(loaded.train.iter().collect::<Vec<_>>(), vec!["train/images", "extra/images"]);
        assert_eq!(loaded.val, ImageDirs::List(vec!["val/images".to_string()]));
        assert_eq!(loaded.train.to_string(), "[train/images, extra/images]");
    }

    #[test]
    fn test_load_rejects_empty_directory_list() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.yaml");
        std::fs::write(&path, "train: []\nval: b\nnames: ['x']\n").unwrap();

        let err = DatasetDescriptor::load(&path).unwrap_err();
        assert!(matches!(err, TrainingError::Configuration(_)));
    }

    #[test]
    fn test_load_rejects_nc_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yaml");
        std::fs::write(&path, "train: a\nval: b\nnc: 5\nnames:\n  0: 'x'\n  1: 'y'\n").unwrap();

        let err = DatasetDescriptor::load(&path).unwrap_err();
        assert!(matches!(err, TrainingError::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let err = DatasetDescriptor::load(Path::new("/nonexistent/plate-ocr.yaml")).unwrap_err();
        assert!(matches!(err, TrainingError::Configuration(_)));
    }
}
