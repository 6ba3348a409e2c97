//! In-process Tesseract recognition.
//!
//! Behind the `tesseract` feature because leptess links against the system
//! Tesseract/Leptonica libraries.

use std::io::Cursor;
use std::path::Path;

use crate::engine::OcrEngine;
use crate::error::EngineError;

/// Recognizes receipt images with Tesseract via leptess.
pub struct TesseractEngine {
    languages: String,
    dpi: u32,
}

impl TesseractEngine {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages, dpi }
    }

    pub fn from_settings(settings: &crate::config::OcrSettings) -> Self {
        Self::new(&settings.languages, settings.dpi)
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    fn recognize_bytes(&self, image_data: &[u8]) -> Result<String, EngineError> {
        let _span = tracing::info_span!("engine.tesseract").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| EngineError::Recognition(format!("Failed to load image: {}", e)))?;

        // Convert to PNG in memory for leptess
        let mut png_data = Vec::new();
        let mut cursor = Cursor::new(&mut png_data);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| EngineError::Recognition(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            EngineError::Recognition(format!("Failed to initialize Tesseract: {}", e))
        })?;
        lt.set_image_from_mem(&png_data)
            .map_err(|e| EngineError::Recognition(format!("Failed to set image for OCR: {}", e)))?;
        lt.get_utf8_text()
            .map_err(|e| EngineError::Recognition(format!("OCR failed: {}", e)))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, path: &Path) -> Result<String, EngineError> {
        // Image formats only; PDFs need rasterizing first, which an external
        // recognizer command handles better.
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            return Err(EngineError::UnsupportedFormat("application/pdf".to_string()));
        }

        let data = std::fs::read(path).map_err(|e| EngineError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.recognize_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_join() {
        let engine = TesseractEngine::new(&["eng".to_string(), "deu".to_string()], 300);
        assert_eq!(engine.languages, "eng+deu");
        assert_eq!(engine.dpi(), 300);
    }

    #[test]
    fn test_default_language() {
        let engine = TesseractEngine::new(&[], 300);
        assert_eq!(engine.languages, "eng");
    }

    #[test]
    fn test_invalid_image_data_error() {
        let engine = TesseractEngine::new(&["eng".to_string()], 300);
        let result = engine.recognize_bytes(b"not valid image data");

        match result {
            Err(EngineError::Recognition(msg)) => {
                assert!(msg.contains("Failed to load image"));
            }
            other => panic!("Expected Recognition error, got {:?}", other),
        }
    }

    #[test]
    fn test_nonexistent_file_error() {
        let engine = TesseractEngine::new(&["eng".to_string()], 300);
        let result = engine.recognize(Path::new("/nonexistent/receipt.png"));
        assert!(matches!(result, Err(EngineError::ReadDocument { .. })));
    }

    #[test]
    fn test_pdf_is_rejected_up_front() {
        let engine = TesseractEngine::new(&["eng".to_string()], 300);
        let result = engine.recognize(Path::new("/tmp/statement.PDF"));
        assert!(matches!(result, Err(EngineError::UnsupportedFormat(_))));
    }
}
