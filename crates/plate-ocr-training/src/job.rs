use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Pretrained weights every training run starts from.
pub const DEFAULT_BASE_MODEL: &str = "yolo11n.pt";

/// Identifier for a training job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainingJobId(pub String);

impl TrainingJobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TrainingJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrainingJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Accelerator selection passed through to the model service.
///
/// Serialized the way the service expects it: a bare device index or `"cpu"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingDevice {
    Gpu(u32),
    Cpu,
}

impl Default for TrainingDevice {
    fn default() -> Self {
        Self::Gpu(0)
    }
}

impl fmt::Display for TrainingDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(idx) => write!(f, "{idx}"),
            Self::Cpu => f.write_str("cpu"),
        }
    }
}

impl FromStr for TrainingDevice {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("cpu") {
            return Ok(Self::Cpu);
        }
        s.strip_prefix("cuda:")
            .unwrap_or(s)
            .parse::<u32>()
            .map(Self::Gpu)
            .map_err(|_| TrainingError::InvalidSpec(format!("unknown device: {s}")))
    }
}

impl Serialize for TrainingDevice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Gpu(idx) => serializer.serialize_u32(*idx),
            Self::Cpu => serializer.serialize_str("cpu"),
        }
    }
}

impl<'de> Deserialize<'de> for TrainingDevice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(u32),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Index(idx) => Ok(Self::Gpu(idx)),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimizer {
    #[serde(rename = "SGD")]
    Sgd,
    Adam,
    AdamW,
    #[serde(rename = "auto")]
    Auto,
}

/// Learning-rate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LrSchedule {
    /// Initial learning rate.
    pub lr0: f64,
    /// Final learning rate as a fraction of `lr0`.
    pub lrf: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub warmup_epochs: f64,
    pub warmup_momentum: f64,
    pub cos_lr: bool,
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self {
            lr0: 0.01,
            lrf: 0.01,
            momentum: 0.937,
            weight_decay: 0.0005,
            warmup_epochs: 3.0,
            warmup_momentum: 0.8,
            cos_lr: true,
        }
    }
}

/// Image/label augmentation parameters. The service owns the algorithms;
/// only their strengths and probabilities live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Augmentation {
    pub hsv_h: f64,
    pub hsv_s: f64,
    pub hsv_v: f64,
    /// Rotation range in degrees.
    pub degrees: f64,
    pub translate: f64,
    pub scale: f64,
    pub shear: f64,
    pub perspective: f64,
    pub flipud: f64,
    pub fliplr: f64,
    pub mosaic: f64,
    pub mixup: f64,
    pub copy_paste: f64,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            hsv_h: 0.015,
            hsv_s: 0.7,
            hsv_v: 0.4,
            degrees: 10.0,
            translate: 0.1,
            scale: 0.5,
            shear: 0.0,
            perspective: 0.0,
            flipud: 0.0,
            fliplr: 0.5,
            mosaic: 1.0,
            mixup: 0.0,
            copy_paste: 0.0,
        }
    }
}

impl Augmentation {
    fn probabilities(&self) -> [(&'static str, f64); 9] {
        [
            ("hsv_h", self.hsv_h),
            ("hsv_s", self.hsv_s),
            ("hsv_v", self.hsv_v),
            ("translate", self.translate),
            ("flipud", self.flipud),
            ("fliplr", self.fliplr),
            ("mosaic", self.mosaic),
            ("mixup", self.mixup),
            ("copy_paste", self.copy_paste),
        ]
    }
}

/// Full parameterization of a training run.
///
/// Field names match the keyword arguments of the model service, and the
/// nested schedule/augmentation groups flatten into the same namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: u32,
    pub batch: u32,
    pub imgsz: u32,
    /// Run name; checkpoints land under `<runs-root>/detect/<name>/weights`.
    pub name: String,
    /// Epochs without improvement before early stopping.
    pub patience: u32,
    pub save: bool,
    pub device: TrainingDevice,
    pub workers: u32,
    pub pretrained: bool,
    pub optimizer: Optimizer,
    pub amp: bool,
    #[serde(flatten)]
    pub schedule: LrSchedule,
    #[serde(flatten)]
    pub augmentation: Augmentation,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch: 16,
            imgsz: 640,
            name: "plate-ocr".to_string(),
            patience: 50,
            save: true,
            device: TrainingDevice::default(),
            workers: 8,
            pretrained: true,
            optimizer: Optimizer::AdamW,
            amp: true,
            schedule: LrSchedule::default(),
            augmentation: Augmentation::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidSpec("epochs must be >= 1".to_string()));
        }
        if self.batch == 0 {
            return Err(TrainingError::InvalidSpec("batch must be >= 1".to_string()));
        }
        if self.imgsz == 0 || self.imgsz % 32 != 0 {
            return Err(TrainingError::InvalidSpec(format!(
                "imgsz must be a positive multiple of 32 (got {})",
                self.imgsz
            )));
        }
        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            return Err(TrainingError::InvalidSpec(format!("invalid run name: {:?}", self.name)));
        }
        if !self.schedule.lr0.is_finite() || self.schedule.lr0 <= 0.0 {
            return Err(TrainingError::InvalidSpec("lr0 must be > 0".to_string()));
        }
        if !self.schedule.lrf.is_finite() || self.schedule.lrf <= 0.0 {
            return Err(TrainingError::InvalidSpec("lrf must be > 0".to_string()));
        }
        for (name, value) in self.augmentation.probabilities() {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrainingError::InvalidSpec(format!("{name} must be within [0, 1] (got {value})")));
            }
        }
        Ok(())
    }
}
