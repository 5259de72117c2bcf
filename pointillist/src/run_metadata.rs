//! Optional TOML record of a run, written as `processing_summary.toml`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::KeypointConfig;
use crate::error::KeypointError;
use crate::model_processing::RunSummary;
use crate::onnx_session::ModelInfo;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RunMetadata {
    pub execution: ExecutionContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<toml::Value>,
    pub stats: RunStats,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

/// Execution context for a run
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ExecutionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub pointillist_version: String,
    pub command_line: Vec<String>,
    pub total_processing_time_ms: f64,
}

/// Device and model details
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SystemInfo {
    pub device_requested: String,
    pub device_selected: String,
    pub device_selection_reason: String,
    pub execution_providers: Vec<String>,
    pub model_path: String,
    pub model_size_bytes: u64,
    pub model_checksum: String,
    pub model_load_time_ms: f64,
}

impl From<&ModelInfo> for SystemInfo {
    fn from(info: &ModelInfo) -> Self {
        Self {
            device_requested: info.device_requested.clone(),
            device_selected: info.device_selected.clone(),
            device_selection_reason: info.device_selection_reason.clone(),
            execution_providers: info.execution_providers.clone(),
            model_path: info.model_path.clone(),
            model_size_bytes: info.model_size_bytes as u64,
            model_checksum: info.model_checksum.clone(),
            model_load_time_ms: info.model_load_time_ms,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub images_found: usize,
    pub images_succeeded: usize,
    pub images_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_keypoints: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub image: String,
    pub stage: String,
    pub kind: String,
    pub error: String,
}

impl RunMetadata {
    pub fn from_run(
        summary: &RunSummary,
        config: &KeypointConfig,
        model_info: Option<&ModelInfo>,
        start_timestamp: DateTime<Utc>,
    ) -> Self {
        // A config that cannot be represented is left out rather than failing the run
        let config = toml::Value::try_from(config)
            .map_err(|e| log::debug!("Config not recorded in metadata: {e}"))
            .ok();

        Self {
            execution: ExecutionContext {
                timestamp: Some(start_timestamp),
                pointillist_version: env!("CARGO_PKG_VERSION").to_string(),
                command_line: std::env::args().collect(),
                total_processing_time_ms: summary.total_time_ms,
            },
            system: model_info.map(SystemInfo::from),
            config,
            stats: RunStats {
                images_found: summary.total_images(),
                images_succeeded: summary.count(),
                images_failed: summary.failures.len(),
                mean_keypoints: summary.mean_keypoints(),
            },
            failures: summary
                .failures
                .iter()
                .map(|failure| FailureRecord {
                    image: failure.image_path.display().to_string(),
                    stage: failure.stage.to_string(),
                    kind: failure.error.kind().to_string(),
                    error: failure.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Write run metadata next to the summary table.
pub fn save_run_metadata(
    summary: &RunSummary,
    config: &KeypointConfig,
    model_info: Option<&ModelInfo>,
    start_timestamp: DateTime<Utc>,
    path: &Path,
) -> Result<(), KeypointError> {
    let metadata = RunMetadata::from_run(summary, config, model_info, start_timestamp);

    let toml_content = toml::to_string_pretty(&metadata).map_err(|e| {
        log::debug!("About to serialize metadata: {metadata:#?}");
        KeypointError::write(path, format!("failed to serialize metadata to TOML: {e}"))
    })?;

    fs::write(path, toml_content).map_err(|e| KeypointError::write(path, e))?;
    log::debug!("Run metadata saved to {}", path.display());
    Ok(())
}
