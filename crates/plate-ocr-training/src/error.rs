use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// Missing or malformed inputs, detected before the model service is contacted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any failure surfaced by the model service.
    #[error("model service error: {0}")]
    Library(String),

    #[error("invalid training config: {0}")]
    InvalidSpec(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    /// Short category name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) | Self::InvalidSpec(_) => "configuration",
            Self::Library(_) => "library",
            Self::Artifact(_) | Self::Io(_) | Self::Json(_) | Self::Yaml(_) => "io",
            Self::Other(_) => "other",
        }
    }

    /// Re-tag an error raised while talking to the model service.
    #[must_use]
    pub fn into_library(self) -> Self {
        match self {
            Self::Library(_) | Self::Configuration(_) | Self::InvalidSpec(_) => self,
            other => Self::Library(other.to_string()),
        }
    }
}
