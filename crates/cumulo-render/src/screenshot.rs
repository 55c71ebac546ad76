//! Encoding captured frames to image files.

use image::{ImageBuffer, Rgba};
use std::path::Path;
use thiserror::Error;

/// Errors from screenshot encoding.
#[derive(Error, Debug)]
pub enum ScreenshotError {
    /// The pixel buffer does not match the declared dimensions.
    #[error("invalid image data for the declared dimensions")]
    InvalidImageData,

    /// The requested file extension is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Readback buffer mapping failed.
    #[error("failed to map capture buffer")]
    BufferMapFailed,

    /// Image encoding failed.
    #[error("image encoding failed: {0}")]
    EncodingFailed(#[from] image::ImageError),
}

/// Saves raw RGBA pixel data to an image file.
///
/// # Arguments
/// * `filename` - Output filename (supports .png, .jpg, .jpeg)
/// * `data` - Raw RGBA pixel data (4 bytes per pixel, top-left origin)
///
/// # Errors
/// Returns an error if the buffer does not match the dimensions, the
/// extension is unsupported, or the file cannot be written.
pub fn save_image(
    filename: &str,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ScreenshotError> {
    let path = Path::new(filename);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, data.to_vec())
        .ok_or(ScreenshotError::InvalidImageData)?;

    match extension.as_str() {
        "png" => {
            img.save_with_format(path, image::ImageFormat::Png)?;
        }
        "jpg" | "jpeg" => {
            // Convert to RGB for JPEG (no alpha)
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => {
            return Err(ScreenshotError::UnsupportedFormat(extension));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_buffer() {
        let result = save_image("/tmp/cumulo_bad.png", &[0u8; 10], 4, 4);
        assert!(matches!(result, Err(ScreenshotError::InvalidImageData)));
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let data = vec![0u8; 4 * 2 * 2];
        let result = save_image("/tmp/cumulo_bad.bmp", &data, 2, 2);
        assert!(matches!(result, Err(ScreenshotError::UnsupportedFormat(_))));
    }
}
