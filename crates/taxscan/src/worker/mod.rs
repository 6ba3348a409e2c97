pub mod pool;

pub use pool::{OcrTask, TaskOutcome, WorkerPool};
