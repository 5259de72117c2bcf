//! Error taxonomy for keypoint extraction runs.
//!
//! Per-image errors (`Decode`, `Inference`, `Write`) are caught by the batch
//! loop and turn a single image into a failure. `Read` comes from reading
//! tables back and never ends a run. The remaining kinds abort the whole run
//! before or while the model session is being set up.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KeypointError {
    #[error("could not decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("no images found in {}", .0.display())]
    NoInput(PathBuf),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to load model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },
}

impl KeypointError {
    /// Build a `Write` error from anything displayable.
    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        KeypointError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `Read` error from anything displayable.
    pub fn read(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        KeypointError::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts the batch instead of a single image.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KeypointError::NoInput(_)
                | KeypointError::Configuration(_)
                | KeypointError::ModelLoad { .. }
        )
    }

    /// Short stable name, used in logs and run metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            KeypointError::Decode { .. } => "decode",
            KeypointError::Inference(_) => "inference",
            KeypointError::Write { .. } => "write",
            KeypointError::Read { .. } => "read",
            KeypointError::NoInput(_) => "no-input",
            KeypointError::Configuration(_) => "configuration",
            KeypointError::ModelLoad { .. } => "model-load",
        }
    }
}
