use crate::error::EngineError;
use crate::processor::ocr::{prepare_image, EngineOutput, OcrEngine};

/// Tesseract via leptess. A fresh `LepTess` instance is created per page so
/// no state leaks between calls.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    default_language: String,
    dpi: u32,
    max_image_side: u32,
}

impl TesseractEngine {
    pub fn new(default_language: &str, dpi: u32, max_image_side: u32) -> Self {
        Self {
            default_language: default_language.to_string(),
            dpi,
            max_image_side,
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &[u8], language: &str) -> Result<EngineOutput, EngineError> {
        let _span = tracing::info_span!("processor.ocr", engine = "tesseract").entered();

        let png_data = prepare_image(image, self.max_image_side)?;

        let mut lt = leptess::LepTess::new(None, language).map_err(|e| {
            EngineError::Unavailable(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| EngineError::Failed(format!("Failed to set image for OCR: {}", e)))?;
        lt.set_source_resolution(self.dpi as i32);

        let text = lt
            .get_utf8_text()
            .map_err(|e| EngineError::Failed(format!("OCR failed: {}", e)))?;

        let layout = lt
            .get_hocr_text(0)
            .map_err(|e| EngineError::Failed(format!("hOCR rendering failed: {}", e)))?;

        // MeanTextConf averages word confidences on a 0..=100 scale.
        let confidence = (lt.mean_text_conf().max(0) as f64 / 100.0).min(1.0);

        Ok(EngineOutput {
            text,
            layout,
            confidence,
        })
    }

    fn is_available(&self) -> bool {
        leptess::LepTess::new(None, &self.default_language).is_ok()
    }
}
