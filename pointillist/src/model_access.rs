//! Weights location handling.
//!
//! Only SuperPoint `sp_v6` weights are accepted. The location passed on the
//! command line must be either a directory named `sp_v6` holding `model.onnx`,
//! or a model file named `sp_v6.onnx`. Names are checked before anything
//! else runs so a wrong model never touches an image.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::KeypointError;

/// Expected weights name.
pub const WEIGHTS_NAME: &str = "sp_v6";

/// Model file looked up inside a weights directory.
pub const MODEL_FILENAME: &str = "model.onnx";

/// A validated weights location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightsLocation {
    /// The path as given by the user
    pub location: PathBuf,
    /// The ONNX file that will be loaded
    pub model_file: PathBuf,
}

impl WeightsLocation {
    /// Check the naming convention and work out which file to load.
    pub fn resolve(location: &Path) -> Result<Self, KeypointError> {
        let name = location
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let model_file = if name == WEIGHTS_NAME {
            location.join(MODEL_FILENAME)
        } else if name == format!("{WEIGHTS_NAME}.onnx") {
            location.to_path_buf()
        } else {
            return Err(KeypointError::Configuration(format!(
                "weights location must be named '{WEIGHTS_NAME}' or '{WEIGHTS_NAME}.onnx', got '{}'",
                location.display()
            )));
        };

        Ok(Self {
            location: location.to_path_buf(),
            model_file,
        })
    }

    /// Read the model bytes, rejecting missing or empty files.
    pub fn read_model_bytes(&self) -> Result<Vec<u8>, KeypointError> {
        let bytes = fs::read(&self.model_file).map_err(|e| KeypointError::ModelLoad {
            path: self.model_file.clone(),
            reason: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(KeypointError::ModelLoad {
                path: self.model_file.clone(),
                reason: "model file is empty (0 bytes)".to_string(),
            });
        }

        let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
        log::debug!("✓ Model file size: {size_mb:.2} MB");

        Ok(bytes)
    }
}

/// Calculate MD5 hash of bytes
pub fn calculate_md5_bytes(bytes: &[u8]) -> String {
    let mut hasher = md5::Context::new();
    hasher.consume(bytes);
    let result = hasher.finalize();
    format!("{result:x}")
}
