use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::KeypointError;

/// Extensions accepted as input images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Check if a file is a supported image format
/// Supports: jpg, jpeg, png, bmp
pub fn is_supported_image_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext_lower = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
    } else {
        false
    }
}

/// Find all image files in a directory (non-recursive)
///
/// Each file appears once no matter how its extension is cased.
pub fn find_images_in_directory(dir_path: &Path) -> Result<Vec<PathBuf>, KeypointError> {
    let entries = fs::read_dir(dir_path).map_err(|e| {
        KeypointError::Configuration(format!(
            "cannot read input folder {}: {e}",
            dir_path.display()
        ))
    })?;

    let mut image_files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            KeypointError::Configuration(format!(
                "cannot list input folder {}: {e}",
                dir_path.display()
            ))
        })?;
        let path = entry.path();

        if path.is_file() && is_supported_image_file(&path) {
            image_files.push(path);
        }
    }

    // Sort for consistent ordering
    image_files.sort();
    image_files.dedup();
    Ok(image_files)
}

/// Collect the images a batch will process, failing when there are none.
pub fn collect_images(input_dir: &Path) -> Result<Vec<PathBuf>, KeypointError> {
    let image_files = find_images_in_directory(input_dir)?;

    if image_files.is_empty() {
        return Err(KeypointError::NoInput(input_dir.to_path_buf()));
    }

    warn_on_stem_collisions(&image_files);
    Ok(image_files)
}

/// Output files are named after the input stem, so `a.jpg` and `a.png`
/// cannot both use `a`. The later ones are renamed by
/// [`crate::output_manager::output_names`].
fn warn_on_stem_collisions(image_files: &[PathBuf]) {
    let mut by_stem: HashMap<String, Vec<&PathBuf>> = HashMap::new();
    for path in image_files {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        by_stem.entry(stem).or_default().push(path);
    }

    let mut collisions: Vec<_> = by_stem.into_iter().filter(|(_, v)| v.len() > 1).collect();
    collisions.sort_by(|a, b| a.0.cmp(&b.0));
    for (stem, paths) in collisions {
        log::warn!(
            "{}{} inputs share the stem '{stem}'; later ones are written with their extension appended",
            crate::color_utils::symbols::warning(),
            paths.len()
        );
    }
}
