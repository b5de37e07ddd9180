pub mod image;
pub mod ocr;
pub mod pdf;
pub mod recognizer;

#[cfg(feature = "tesseract")]
pub mod tesseract;

#[cfg(not(feature = "tesseract"))]
pub mod tesseract_stub;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SplitError;

pub use self::image::ImageSplitter;
pub use self::ocr::{EngineOutput, OcrEngine};
pub use self::pdf::{PdfSplitter, PopplerRasterizer, Rasterizer};
pub use self::recognizer::{PageRecognizer, RecognitionFailure, Recognized, RetryPolicy};

#[cfg(feature = "tesseract")]
pub use self::tesseract::TesseractEngine;

#[cfg(not(feature = "tesseract"))]
pub use self::tesseract_stub::TesseractEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Image,
}

impl DocumentFormat {
    /// Maps a declared media type (as sent by the uploader) to a format.
    /// Parameters such as `; charset=...` are ignored.
    pub fn from_declared_type(declared_type: &str) -> Option<Self> {
        let essence = declared_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            "image/png" | "image/jpeg" | "image/jpg" | "image/pjpeg" | "image/tiff"
            | "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Detects the MIME type of a file from its extension.
/// Returns `None` for unknown extensions.
pub fn detect_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}

/// One page yielded by a splitter. A page that failed to rasterize carries
/// its error instead of image bytes; the remaining pages are unaffected.
#[derive(Debug)]
pub struct RasterPage {
    /// 1-based position in the source document.
    pub index: usize,
    pub image: Result<Vec<u8>, SplitError>,
}

/// Lazy, single-pass sequence of pages in source order.
pub struct PageSource {
    page_count: usize,
    pages: Box<dyn Iterator<Item = RasterPage> + Send>,
}

impl PageSource {
    pub fn new(page_count: usize, pages: Box<dyn Iterator<Item = RasterPage> + Send>) -> Self {
        Self { page_count, pages }
    }

    pub fn single(image: Vec<u8>) -> Self {
        let page = RasterPage {
            index: 1,
            image: Ok(image),
        };
        Self::new(1, Box::new(std::iter::once(page)))
    }

    /// Number of pages the document declares; fixed before iteration starts.
    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl Iterator for PageSource {
    type Item = RasterPage;

    fn next(&mut self) -> Option<Self::Item> {
        self.pages.next()
    }
}

/// Splitting capability, selected from the declared document format.
pub enum DocumentSplitter {
    SinglePage(ImageSplitter),
    MultiPage(PdfSplitter),
}

impl DocumentSplitter {
    pub fn for_format(format: DocumentFormat, rasterizer: Arc<dyn Rasterizer>, dpi: u32) -> Self {
        match format {
            DocumentFormat::Image => Self::SinglePage(ImageSplitter::new()),
            DocumentFormat::Pdf => Self::MultiPage(PdfSplitter::new(rasterizer, dpi)),
        }
    }

    /// Opens the document. Only whole-file problems are reported here;
    /// per-page failures surface through the returned `PageSource`.
    pub fn split(&self, path: &Path) -> Result<PageSource, SplitError> {
        match self {
            Self::SinglePage(splitter) => splitter.split(path),
            Self::MultiPage(splitter) => splitter.split(path),
        }
    }
}
