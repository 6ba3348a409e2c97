//! Text-recognition engine boundary.
//!
//! The queue treats whatever produces text as a black box behind
//! [`OcrEngine`]. An engine may return text, return an error, or die without
//! reporting; the worker pool survives all three.

pub mod command;
#[cfg(feature = "tesseract")]
pub mod tesseract;

pub use command::CommandEngine;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;

use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;

/// Fixed result reported in deterministic mock mode.
pub const MOCK_OCR_TEXT: &str = "TEST_OCR_TEXT";

/// Black-box text recognizer, invoked once per job on a worker thread.
///
/// Implementations are treated as unreliable: a returned error and a panic
/// both end the job as failed, never the process.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, path: &Path) -> Result<String, EngineError>;
}

/// Success payload shape produced by external recognizers: either a bare
/// JSON string or an object carrying a `text` field. Normalized to a plain
/// string the moment it crosses the boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnginePayload {
    Text(String),
    Structured { text: String },
}

impl EnginePayload {
    pub fn into_text(self) -> String {
        match self {
            EnginePayload::Text(text) | EnginePayload::Structured { text } => text,
        }
    }
}
