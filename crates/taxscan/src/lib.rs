pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod logging;
pub mod queue;
pub mod store;
pub mod worker;

pub use config::{OcrMode, OcrSettings, QueueConfig};
#[cfg(feature = "tesseract")]
pub use engine::TesseractEngine;
pub use engine::{CommandEngine, EnginePayload, OcrEngine, MOCK_OCR_TEXT};
pub use error::{ConfigError, EngineError, QueueError, Result, StoreError, TaxscanError};
pub use job::{Job, JobStatus};
pub use queue::OcrQueue;
pub use store::JsonStore;
pub use worker::WorkerPool;
