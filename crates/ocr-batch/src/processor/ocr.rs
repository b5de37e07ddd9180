use std::io::Cursor;

use image::GenericImageView;

use crate::error::EngineError;

/// What the engine produced for one page image.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub text: String,
    /// Layout-preserving form (hOCR for Tesseract).
    pub layout: String,
    /// Mean certainty over detected text regions, in [0, 1].
    pub confidence: f64,
}

/// Black-box OCR engine invoked once per page. Implementations must be
/// stateless across calls.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &[u8], language: &str) -> Result<EngineOutput, EngineError>;

    /// Whether the engine can be initialized for its default language.
    fn is_available(&self) -> bool;
}

/// Target size that fits `(width, height)` inside `max_side`, or `None`
/// when the image already fits.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub(crate) fn fit_within(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_side || longest == 0 {
        return None;
    }

    let scale = max_side as f64 / longest as f64;
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);
    Some((new_width, new_height))
}

/// Decodes a page image, downscales it to `max_side` and re-encodes it as PNG
/// for the engine.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub(crate) fn prepare_image(image_data: &[u8], max_side: u32) -> Result<Vec<u8>, EngineError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| EngineError::Failed(format!("Failed to load image: {}", e)))?;

    let (width, height) = img.dimensions();
    let img = match fit_within(width, height, max_side) {
        Some((w, h)) => img.resize(w, h, image::imageops::FilterType::Lanczos3),
        None => img,
    };

    let mut png_data = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
        .map_err(|e| EngineError::Failed(format!("Failed to convert image: {}", e)))?;

    Ok(png_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_leaves_small_images() {
        assert_eq!(fit_within(800, 600, 2400), None);
        assert_eq!(fit_within(2400, 100, 2400), None);
    }

    #[test]
    fn test_fit_within_scales_longest_side() {
        assert_eq!(fit_within(4800, 2400, 2400), Some((2400, 1200)));
        assert_eq!(fit_within(1000, 5000, 2500), Some((500, 2500)));
    }

    #[test]
    fn test_prepare_image_downscales() {
        let img = image::RgbImage::from_pixel(40, 20, image::Rgb([0, 0, 0]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let prepared = prepare_image(&bytes, 10).unwrap();
        let decoded = image::load_from_memory(&prepared).unwrap();
        assert_eq!(decoded.dimensions(), (10, 5));
    }

    #[test]
    fn test_prepare_image_rejects_garbage() {
        match prepare_image(b"not valid image data", 2400) {
            Err(EngineError::Failed(msg)) => assert!(msg.contains("Failed to load image")),
            other => panic!("Expected Failed error, got {:?}", other),
        }
    }
}
