use log::Level;
use ort::{
    execution_providers::{CPUExecutionProvider, CoreMLExecutionProvider, ExecutionProvider},
    logging::LogLevel,
    session::Session,
};
use serde::Serialize;
use std::time::Instant;

use crate::color_utils::symbols;
use crate::error::KeypointError;
use crate::model_access::{calculate_md5_bytes, WeightsLocation};

fn log_level_from_ort(level: LogLevel) -> Level {
    match level {
        LogLevel::Verbose => Level::Trace,
        LogLevel::Info => Level::Trace,
        LogLevel::Warning => Level::Debug,
        LogLevel::Error => Level::Info,
        LogLevel::Fatal => Level::Error,
    }
}

fn ort_level_from_log(level: Level) -> LogLevel {
    match level {
        // ONNX's info is so verbose that it is more like our trace
        Level::Trace => LogLevel::Verbose,
        Level::Debug => LogLevel::Warning,
        Level::Info => LogLevel::Error,
        Level::Warn => LogLevel::Error,
        Level::Error => LogLevel::Fatal,
    }
}

/// What was loaded and how, recorded in run metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub model_size_bytes: usize,
    pub model_checksum: String,
    pub device_requested: String,
    pub device_selected: String,
    pub device_selection_reason: String,
    pub execution_providers: Vec<String>,
    pub model_load_time_ms: f64,
}

/// Device selection result
#[derive(Debug, Clone)]
pub struct DeviceSelection {
    pub device: String,
    pub reason: String,
}

/// Determine optimal device based on user preference
pub fn determine_optimal_device(requested_device: &str) -> DeviceSelection {
    match requested_device {
        "auto" => {
            // For auto, prefer CoreML if available, otherwise CPU
            let coreml = CoreMLExecutionProvider::default();
            match coreml.is_available() {
                Ok(true) => DeviceSelection {
                    device: "coreml".to_string(),
                    reason: "Auto-selected CoreML (available)".to_string(),
                },
                _ => DeviceSelection {
                    device: "cpu".to_string(),
                    reason: "Auto-selected CPU (CoreML not available)".to_string(),
                },
            }
        }
        other => DeviceSelection {
            device: other.to_string(),
            reason: format!("User explicitly chose {other}"),
        },
    }
}

/// Create an ONNX Runtime session for the given weights.
///
/// The session is the only heavy resource of a run; callers create one per
/// batch and drop it when the batch returns.
pub fn create_onnx_session(
    weights: &WeightsLocation,
    requested_device: &str,
) -> Result<(Session, ModelInfo), KeypointError> {
    let load_start = Instant::now();
    let load_error = |reason: String| KeypointError::ModelLoad {
        path: weights.model_file.clone(),
        reason,
    };

    let bytes = weights.read_model_bytes()?;
    let selection = determine_optimal_device(requested_device);

    let execution_providers = match selection.device.as_str() {
        "coreml" => match CoreMLExecutionProvider::default().is_available() {
            Ok(true) => vec![
                CoreMLExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ],
            _ => {
                log::warn!(
                    "{}CoreML not available, falling back to CPU",
                    symbols::warning()
                );
                vec![CPUExecutionProvider::default().build()]
            }
        },
        "cpu" => {
            log::info!("🖥️  Using CPU execution provider");
            vec![CPUExecutionProvider::default().build()]
        }
        _ => {
            log::warn!(
                "{}Unknown device '{}', using CPU",
                symbols::warning(),
                selection.device
            );
            vec![CPUExecutionProvider::default().build()]
        }
    };

    // Store EP info for logging before moving the vector
    let ep_names: Vec<String> = execution_providers
        .iter()
        .map(|ep| format!("{ep:?}"))
        .collect();

    // Choose the ORT log level based on what is enabled for us
    let ort_log_level = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
    ]
    .into_iter()
    .find(|&lvl| log::log_enabled!(lvl))
    .map(ort_level_from_log)
    .unwrap_or(LogLevel::Fatal);

    let session = Session::builder()
        .map_err(|e| load_error(format!("Failed to create session builder: {e}")))?
        .with_logger(Box::new(|level, _, _, _, msg| {
            // relog to our standard logger at the mapped level
            let log_level = log_level_from_ort(level);
            log::log!(log_level, "[onnx] {msg}")
        }))
        .map_err(|e| load_error(format!("Failed to set logger: {e}")))?
        .with_log_level(ort_log_level)
        .map_err(|e| load_error(format!("Failed to set log level: {e}")))?
        .with_execution_providers(execution_providers)
        .map_err(|e| load_error(format!("Failed to set execution providers: {e}")))?
        .commit_from_memory(&bytes)
        .map_err(|e| load_error(format!("Failed to load model from memory: {e}")))?;

    log::debug!(
        "{} Execution providers registered: {}",
        symbols::system_setup(),
        ep_names.join(" -> ")
    );

    let info = ModelInfo {
        model_path: weights.model_file.display().to_string(),
        model_size_bytes: bytes.len(),
        model_checksum: calculate_md5_bytes(&bytes),
        device_requested: requested_device.to_string(),
        device_selected: selection.device,
        device_selection_reason: selection.reason,
        execution_providers: ep_names,
        model_load_time_ms: load_start.elapsed().as_secs_f64() * 1000.0,
    };

    Ok((session, info))
}
