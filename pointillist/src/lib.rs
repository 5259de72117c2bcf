pub mod color_utils;
pub mod config;
pub mod error;
pub mod export;
pub mod image_input;
pub mod keypoints;
pub mod model_access;
pub mod model_processing;
pub mod onnx_session;
pub mod output_manager;
pub mod preprocessing;
pub mod progress;
pub mod run_metadata;
pub mod superpoint;
pub mod visualization;

pub use config::KeypointConfig;
pub use error::KeypointError;
pub use keypoints::{extract_keypoints, Keypoint, RankedKeypointSet};
pub use model_processing::{
    run_batch_with, run_keypoint_batch, ConfidenceModel, ImageOutcome, RunSummary,
};
