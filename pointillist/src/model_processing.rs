//! Batch orchestration for keypoint extraction.
//!
//! A run validates its inputs, loads the model once, then walks the images in
//! order. Each image moves through
//! `Pending -> Preprocessed -> Inferred -> Extracted -> Exported -> Done`;
//! an error at any stage turns that image into an [`ImageFailure`] and the
//! loop moves on. Only fatal errors (bad weights name, no input, model load,
//! output folder or summary write) end the run early.

use chrono::Utc;
use log::{debug, info, warn};
use ndarray::{Array2, Array4};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::color_utils::symbols;
use crate::config::KeypointConfig;
use crate::error::KeypointError;
use crate::export::{save_keypoints_to_csv, save_summary_csv, SummaryRow};
use crate::image_input::collect_images;
use crate::keypoints::{extract_keypoints, RankedKeypointSet};
use crate::model_access::WeightsLocation;
use crate::onnx_session::ModelInfo;
use crate::output_manager::{output_names, OutputManager};
use crate::preprocessing::preprocess_image;
use crate::progress::{create_batch_progress_bar, finish_progress_bar};
use crate::run_metadata::save_run_metadata;
use crate::superpoint::SuperPointModel;
use crate::visualization::{draw_keypoints, save_visualization};

/// Anything that turns a preprocessed image tensor into a confidence grid.
pub trait ConfidenceModel {
    /// Run the network on a `(1, height, width, 1)` tensor.
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, KeypointError>;

    /// Details about the loaded model, when there are any to report.
    fn model_info(&self) -> Option<&ModelInfo> {
        None
    }
}

/// Where an image was in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Pending,
    Preprocessed,
    Inferred,
    Extracted,
    Exported,
    Done,
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageStage::Pending => "pending",
            ImageStage::Preprocessed => "preprocessed",
            ImageStage::Inferred => "inferred",
            ImageStage::Extracted => "extracted",
            ImageStage::Exported => "exported",
            ImageStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A successfully processed image.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub image_name: String,
    pub image_path: PathBuf,
    pub keypoints: RankedKeypointSet,
    pub csv_path: PathBuf,
    pub visualization_path: PathBuf,
    pub processing_time_ms: f64,
}

impl ImageResult {
    pub fn num_keypoints(&self) -> usize {
        self.keypoints.len()
    }

    pub fn summary_row(&self) -> SummaryRow {
        SummaryRow {
            image_name: self.image_name.clone(),
            num_keypoints: self.num_keypoints(),
            csv_path: self.csv_path.display().to_string(),
            visualization_path: self.visualization_path.display().to_string(),
        }
    }
}

/// An image that could not be processed. `stage` is the last stage it
/// reached; the failing operation is the one that follows it.
#[derive(Debug)]
pub struct ImageFailure {
    pub image_name: String,
    pub image_path: PathBuf,
    pub stage: ImageStage,
    pub error: KeypointError,
}

#[derive(Debug)]
pub enum ImageOutcome {
    Success(ImageResult),
    Failure(ImageFailure),
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// Successful images in processing order
    pub results: Vec<ImageResult>,
    /// Failed images, for reporting only; they never become summary rows
    pub failures: Vec<ImageFailure>,
    pub summary_path: PathBuf,
    pub total_time_ms: f64,
}

impl RunSummary {
    pub fn count(&self) -> usize {
        self.results.len()
    }

    pub fn total_images(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Mean keypoints per successful image, `None` when nothing succeeded.
    pub fn mean_keypoints(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        let total: usize = self.results.iter().map(ImageResult::num_keypoints).sum();
        Some(total as f64 / self.results.len() as f64)
    }

    pub fn rows(&self) -> Vec<SummaryRow> {
        self.results.iter().map(ImageResult::summary_row).collect()
    }
}

fn run_image_stages<M: ConfidenceModel>(
    model: &mut M,
    image_path: &Path,
    image_name: &str,
    config: &KeypointConfig,
    output: &OutputManager,
    stage: &mut ImageStage,
) -> Result<ImageResult, KeypointError> {
    let processing_start = Instant::now();

    let prepared = preprocess_image(image_path, config.image_size())?;
    *stage = ImageStage::Preprocessed;

    let inference_start = Instant::now();
    let grid = model.infer(&prepared.tensor)?;
    *stage = ImageStage::Inferred;
    debug!(
        "⚡ Inference completed in {:.1} ms, grid {}x{}",
        inference_start.elapsed().as_secs_f64() * 1000.0,
        grid.nrows(),
        grid.ncols()
    );

    let keypoints = extract_keypoints(&grid, config.keep_k_points);
    drop(grid);
    *stage = ImageStage::Extracted;

    let csv_path = output.keypoint_csv_path(image_name);
    save_keypoints_to_csv(&keypoints, &csv_path)?;

    let visualization_path = output.visualization_path(image_name);
    let overlay = draw_keypoints(&prepared.color, &keypoints);
    if let Err(e) = save_visualization(&overlay, &visualization_path) {
        // A failed image leaves no table behind
        if let Err(remove_err) = fs::remove_file(&csv_path) {
            warn!(
                "{}Could not remove {}: {remove_err}",
                symbols::warning(),
                csv_path.display()
            );
        }
        return Err(e);
    }
    *stage = ImageStage::Exported;

    let result = ImageResult {
        image_name: image_name.to_string(),
        image_path: image_path.to_path_buf(),
        keypoints,
        csv_path,
        visualization_path,
        processing_time_ms: processing_start.elapsed().as_secs_f64() * 1000.0,
    };
    *stage = ImageStage::Done;

    Ok(result)
}

/// Process a single image through the complete pipeline, writing its outputs
/// under `image_name`.
pub fn process_single_image<M: ConfidenceModel>(
    model: &mut M,
    image_path: &Path,
    image_name: &str,
    config: &KeypointConfig,
    output: &OutputManager,
) -> ImageOutcome {
    let mut stage = ImageStage::Pending;
    match run_image_stages(model, image_path, image_name, config, output, &mut stage) {
        Ok(result) => ImageOutcome::Success(result),
        Err(error) => ImageOutcome::Failure(ImageFailure {
            image_name: image_name.to_string(),
            image_path: image_path.to_path_buf(),
            stage,
            error,
        }),
    }
}

/// Run a batch with the SuperPoint ONNX model.
pub fn run_keypoint_batch(config: &KeypointConfig) -> Result<RunSummary, KeypointError> {
    run_batch_with(config, |weights| {
        SuperPointModel::load(weights, &config.device)
    })
}

/// Run a batch with the model produced by `load_model`.
///
/// Weights naming and input discovery are checked before `load_model` is
/// called, and it is called at most once. The model lives until this
/// function returns.
pub fn run_batch_with<M, F>(
    config: &KeypointConfig,
    load_model: F,
) -> Result<RunSummary, KeypointError>
where
    M: ConfidenceModel,
    F: FnOnce(&WeightsLocation) -> Result<M, KeypointError>,
{
    let run_start = Instant::now();
    let start_timestamp = Utc::now();

    let weights = WeightsLocation::resolve(&config.weights)?;
    let image_files = collect_images(&config.input_dir)?;
    info!(
        "{} Found {} image(s) to process",
        symbols::resources_found(),
        image_files.len()
    );

    let output = OutputManager::new(&config.output_dir);
    output.create_dirs()?;

    let mut model = load_model(&weights)?;
    info!(
        "{}Loaded model from {}",
        symbols::model_loaded(),
        weights.model_file.display()
    );

    let progress_bar = create_batch_progress_bar(image_files.len());
    let names = output_names(&image_files);
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for (index, (image_path, image_name)) in image_files.iter().zip(&names).enumerate() {
        if let Some(pb) = &progress_bar {
            pb.set_message(image_name.clone());
        }

        match process_single_image(&mut model, image_path, image_name, config, &output) {
            ImageOutcome::Success(result) => {
                info!(
                    "{} Processed {} ({}/{}) in {:.1}ms: {} keypoints",
                    symbols::completed_successfully(),
                    image_path.display(),
                    index + 1,
                    image_files.len(),
                    result.processing_time_ms,
                    result.num_keypoints()
                );
                results.push(result);
            }
            ImageOutcome::Failure(failure) => {
                warn!(
                    "{} Failed to process {} ({}/{}) after stage '{}': {}",
                    symbols::operation_failed(),
                    image_path.display(),
                    index + 1,
                    image_files.len(),
                    failure.stage,
                    failure.error
                );
                failures.push(failure);
            }
        }

        if let Some(pb) = &progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = &progress_bar {
        finish_progress_bar(pb);
    }

    let summary = RunSummary {
        results,
        failures,
        summary_path: output.summary_csv_path(),
        total_time_ms: run_start.elapsed().as_secs_f64() * 1000.0,
    };

    save_summary_csv(&summary.rows(), &summary.summary_path)?;

    if config.write_metadata {
        save_run_metadata(
            &summary,
            config,
            model.model_info(),
            start_timestamp,
            &output.metadata_path(),
        )?;
    }

    if !summary.failures.is_empty() {
        warn!(
            "{}{} of {} images failed to process",
            symbols::completed_partially_successfully(),
            summary.failures.len(),
            summary.total_images()
        );
    }
    info!(
        "{} Processed {} images in {:.1}s, summary saved to {}",
        symbols::completed_successfully(),
        summary.count(),
        summary.total_time_ms / 1000.0,
        summary.summary_path.display()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Returns a grid with a single bright cell at the image's center.
    struct CenterModel;

    impl ConfidenceModel for CenterModel {
        fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, KeypointError> {
            let (h, w) = (input.shape()[1], input.shape()[2]);
            let mut grid = Array2::zeros((h, w));
            grid[[h / 2, w / 2]] = 9.0;
            Ok(grid)
        }
    }

    struct BrokenModel;

    impl ConfidenceModel for BrokenModel {
        fn infer(&mut self, _input: &Array4<f32>) -> Result<Array2<f32>, KeypointError> {
            Err(KeypointError::Inference("session exploded".to_string()))
        }
    }

    fn setup(temp_dir: &TempDir) -> (KeypointConfig, OutputManager, PathBuf) {
        let image_path = temp_dir.path().join("frame.png");
        RgbImage::from_pixel(12, 9, Rgb([40, 40, 40]))
            .save(&image_path)
            .unwrap();

        let mut config = KeypointConfig::new(
            temp_dir.path(),
            temp_dir.path().join("sp_v6"),
            temp_dir.path().join("out"),
        );
        config.image_width = 8;
        config.image_height = 6;

        let output = OutputManager::new(&config.output_dir);
        output.create_dirs().unwrap();
        (config, output, image_path)
    }

    #[test]
    fn test_single_image_success_reaches_done() {
        let temp_dir = TempDir::new().unwrap();
        let (config, output, image_path) = setup(&temp_dir);

        let outcome = process_single_image(&mut CenterModel, &image_path, "frame", &config, &output);
        let ImageOutcome::Success(result) = outcome else {
            panic!("expected success");
        };

        assert_eq!(result.image_name, "frame");
        assert_eq!(result.num_keypoints(), 1);
        assert_eq!(result.keypoints[0].y, 3);
        assert_eq!(result.keypoints[0].x, 4);
        assert!(result.csv_path.ends_with("csv/frame_keypoints.csv"));
        assert!(result.csv_path.exists());
        assert!(result.visualization_path.exists());
    }

    #[test]
    fn test_inference_failure_is_tagged_with_stage() {
        let temp_dir = TempDir::new().unwrap();
        let (config, output, image_path) = setup(&temp_dir);

        let outcome = process_single_image(&mut BrokenModel, &image_path, "frame", &config, &output);
        let ImageOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };

        assert_eq!(failure.stage, ImageStage::Preprocessed);
        assert!(matches!(failure.error, KeypointError::Inference(_)));
        assert!(!output.keypoint_csv_path("frame").exists());
    }

    #[test]
    fn test_decode_failure_stays_pending() {
        let temp_dir = TempDir::new().unwrap();
        let (config, output, _) = setup(&temp_dir);
        let corrupt = temp_dir.path().join("corrupt.jpg");
        std::fs::write(&corrupt, b"nope").unwrap();

        let outcome = process_single_image(&mut CenterModel, &corrupt, "corrupt", &config, &output);
        let ImageOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };

        assert_eq!(failure.stage, ImageStage::Pending);
        assert_eq!(failure.image_name, "corrupt");
        assert!(matches!(failure.error, KeypointError::Decode { .. }));
    }

    #[test]
    fn test_write_failure_after_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let (config, output, image_path) = setup(&temp_dir);
        std::fs::remove_dir_all(output.csv_dir()).unwrap();

        let outcome = process_single_image(&mut CenterModel, &image_path, "frame", &config, &output);
        let ImageOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };

        assert_eq!(failure.stage, ImageStage::Extracted);
        assert!(matches!(failure.error, KeypointError::Write { .. }));
    }

    #[test]
    fn test_overlay_failure_leaves_no_table() {
        let temp_dir = TempDir::new().unwrap();
        let (config, output, image_path) = setup(&temp_dir);
        // A folder where the overlay file should go makes the save fail
        std::fs::create_dir(output.visualization_path("frame")).unwrap();

        let outcome = process_single_image(&mut CenterModel, &image_path, "frame", &config, &output);
        let ImageOutcome::Failure(failure) = outcome else {
            panic!("expected failure");
        };

        assert_eq!(failure.stage, ImageStage::Extracted);
        assert!(matches!(failure.error, KeypointError::Write { .. }));
        assert!(!output.keypoint_csv_path("frame").exists());
    }

    #[test]
    fn test_mean_keypoints() {
        let result = |n: usize| ImageResult {
            image_name: format!("img{n}"),
            image_path: PathBuf::from(format!("img{n}.jpg")),
            keypoints: vec![
                crate::keypoints::Keypoint {
                    y: 0,
                    x: 0,
                    confidence: 1
                };
                n
            ],
            csv_path: PathBuf::new(),
            visualization_path: PathBuf::new(),
            processing_time_ms: 0.0,
        };

        let summary = RunSummary {
            results: vec![result(2), result(5)],
            failures: vec![],
            summary_path: PathBuf::new(),
            total_time_ms: 0.0,
        };
        assert_eq!(summary.mean_keypoints(), Some(3.5));

        let empty = RunSummary {
            results: vec![],
            failures: vec![],
            summary_path: PathBuf::new(),
            total_time_ms: 0.0,
        };
        assert_eq!(empty.mean_keypoints(), None);
    }
}
