use std::path::Path;

use image::ImageFormat;

use crate::error::SplitError;
use crate::processor::PageSource;

/// Single-page images are already "paged": the file bytes go straight to
/// the recognizer after a magic-byte check.
#[derive(Debug, Default)]
pub struct ImageSplitter;

impl ImageSplitter {
    pub fn new() -> Self {
        Self
    }

    pub fn split(&self, path: &Path) -> Result<PageSource, SplitError> {
        let _span = tracing::info_span!("splitter.image").entered();

        let image_data = std::fs::read(path).map_err(|e| SplitError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let format = image::guess_format(&image_data)
            .map_err(|e| SplitError::Corrupt(format!("Unrecognized image data: {}", e)))?;

        if !matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Tiff | ImageFormat::Bmp
        ) {
            return Err(SplitError::Corrupt(format!(
                "Unsupported image encoding: {:?}",
                format
            )));
        }

        Ok(PageSource::single(image_data))
    }
}
