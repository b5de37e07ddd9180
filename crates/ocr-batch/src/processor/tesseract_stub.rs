//! Placeholder engine used when the crate is built without the `tesseract`
//! feature. It never recognizes anything and reports itself unavailable, so
//! batches still run to completion with every page recorded as an engine error.

use crate::error::EngineError;
use crate::processor::ocr::{EngineOutput, OcrEngine};

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    default_language: String,
}

impl TesseractEngine {
    pub fn new(default_language: &str, _dpi: u32, _max_image_side: u32) -> Self {
        Self {
            default_language: default_language.to_string(),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, _image: &[u8], _language: &str) -> Result<EngineOutput, EngineError> {
        Err(EngineError::Unavailable(
            "built without the `tesseract` feature".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        tracing::debug!(
            language = %self.default_language,
            "tesseract feature disabled; engine unavailable"
        );
        false
    }
}
