use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use std::path::Path;

use crate::error::KeypointError;

/// A decoded image ready for inference, plus the color copy used for overlays.
pub struct PreprocessedImage {
    /// Normalized grayscale intensities, shape `(1, height, width, 1)`.
    pub tensor: Array4<f32>,
    /// The resized color image, unscaled intensities.
    pub color: RgbImage,
}

/// Load an image and prepare it for the keypoint network.
///
/// The image is stretched to exactly `target_size` (width, height); the
/// network expects that resolution, so aspect ratio is not preserved.
pub fn preprocess_image(
    image_path: &Path,
    target_size: (u32, u32),
) -> Result<PreprocessedImage, KeypointError> {
    let img = image::open(image_path).map_err(|source| KeypointError::Decode {
        path: image_path.to_path_buf(),
        source,
    })?;

    let (width, height) = target_size;
    let color = image::imageops::resize(&img.to_rgb8(), width, height, FilterType::Triangle);
    let tensor = grayscale_tensor(&color);

    Ok(PreprocessedImage { tensor, color })
}

/// Convert to BT.601 luma, quantized to 8 bits, then scaled into [0, 1].
pub fn grayscale_tensor(color: &RgbImage) -> Array4<f32> {
    let (width, height) = color.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 1));

    for (x, y, pixel) in color.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let luma = luma.round().clamp(0.0, 255.0);
        tensor[[0, y as usize, x as usize, 0]] = luma / 255.0;
    }

    tensor
}
