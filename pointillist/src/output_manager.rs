//! Output path management for a keypoint run.
//!
//! Every run writes into one output folder:
//! - `csv/<stem>_keypoints.csv` per image
//! - `visualizations/<stem>_keypoints.jpg` per image
//! - `processing_summary.csv` (and optionally `processing_summary.toml`) at the root
//!
//! Inputs sharing a stem (`a.jpg`, `a.png`) get distinct output names, see
//! [`output_names`].

use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::KeypointError;

pub const CSV_SUBDIR: &str = "csv";
pub const VISUALIZATION_SUBDIR: &str = "visualizations";
pub const SUMMARY_STEM: &str = "processing_summary";
const OUTPUT_SUFFIX: &str = "keypoints";
const VISUALIZATION_EXTENSION: &str = "jpg";

/// Unified output path management for a run
#[derive(Debug, Clone)]
pub struct OutputManager {
    output_dir: PathBuf,
}

impl OutputManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Create the output folder and its subfolders. Existing folders are fine.
    pub fn create_dirs(&self) -> Result<(), KeypointError> {
        for dir in [self.csv_dir(), self.visualization_dir()] {
            fs::create_dir_all(&dir).map_err(|e| KeypointError::write(&dir, e))?;
        }
        debug!("📁 Output folders ready under {}", self.output_dir.display());
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.output_dir.join(CSV_SUBDIR)
    }

    pub fn visualization_dir(&self) -> PathBuf {
        self.output_dir.join(VISUALIZATION_SUBDIR)
    }

    /// Keypoint table path for an image's output name
    pub fn keypoint_csv_path(&self, output_name: &str) -> PathBuf {
        self.csv_dir()
            .join(format!("{output_name}_{OUTPUT_SUFFIX}.csv"))
    }

    /// Overlay image path for an image's output name
    pub fn visualization_path(&self, output_name: &str) -> PathBuf {
        self.visualization_dir().join(format!(
            "{output_name}_{OUTPUT_SUFFIX}.{VISUALIZATION_EXTENSION}"
        ))
    }

    pub fn summary_csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("{SUMMARY_STEM}.csv"))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join(format!("{SUMMARY_STEM}.toml"))
    }
}

/// Get the input file stem (filename without extension)
pub fn input_stem(input_path: &Path) -> String {
    input_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

/// One output name per input, in input order, with no two alike.
///
/// The first input with a given stem keeps the bare stem. Later ones get
/// their lowercased extension appended (`a.png` -> `a_png`), then a counter
/// if that is still taken.
pub fn output_names(image_files: &[PathBuf]) -> Vec<String> {
    let mut used = HashSet::new();
    let mut names = Vec::with_capacity(image_files.len());

    for path in image_files {
        let stem = input_stem(path);
        let name = if used.contains(&stem) {
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let base = format!("{stem}_{extension}");
            let mut candidate = base.clone();
            let mut n = 2;
            while used.contains(&candidate) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            debug!(
                "Writing outputs for {} as '{candidate}'",
                path.display()
            );
            candidate
        } else {
            stem
        };

        used.insert(name.clone());
        names.push(name);
    }

    names
}
