//! Saving captured frames to image files.

use image::{DynamicImage, ImageBuffer, ImageFormat, RgbaImage};
use std::path::Path;

/// Writes a captured RGBA8 frame (top-left origin) to `filename`.
///
/// The format follows the extension: `.png`, or `.jpg`/`.jpeg` with alpha
/// dropped.
pub fn save_image(
    filename: impl AsRef<Path>,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ScreenshotError> {
    let path = filename.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let frame: RgbaImage = ImageBuffer::from_raw(width, height, data.to_vec())
        .ok_or(ScreenshotError::InvalidImageData { width, height, len: data.len() })?;

    match extension.as_str() {
        "png" => frame.save_with_format(path, ImageFormat::Png)?,
        "jpg" | "jpeg" => DynamicImage::ImageRgba8(frame)
            .to_rgb8()
            .save_with_format(path, ImageFormat::Jpeg)?,
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    }

    log::info!("saved {width}x{height} frame to {}", path.display());
    Ok(())
}

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame of {len} bytes does not match {width}x{height} RGBA")]
    InvalidImageData { width: u32, height: u32, len: usize },
}
