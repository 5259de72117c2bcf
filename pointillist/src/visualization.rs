use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::path::Path;

use crate::error::KeypointError;
use crate::keypoints::Keypoint;

/// Marker radius in pixels.
pub const MARKER_RADIUS: i32 = 2;

/// Marker color (green).
pub const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw every keypoint as a filled circle on a copy of `image`.
///
/// Keypoint rows map to image `y` and columns to `x`. Markers are the same
/// size regardless of confidence.
pub fn draw_keypoints(image: &RgbImage, keypoints: &[Keypoint]) -> RgbImage {
    let mut canvas = image.clone();
    for keypoint in keypoints {
        draw_filled_circle_mut(
            &mut canvas,
            (keypoint.x as i32, keypoint.y as i32),
            MARKER_RADIUS,
            MARKER_COLOR,
        );
    }
    canvas
}

/// Save an overlay; the format follows the file extension.
pub fn save_visualization(image: &RgbImage, output_path: &Path) -> Result<(), KeypointError> {
    image
        .save(output_path)
        .map_err(|e| KeypointError::write(output_path, e))
}
