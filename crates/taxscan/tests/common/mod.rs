//! Shared helpers for queue integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use taxscan::error::EngineError;
use taxscan::{Job, OcrEngine, OcrQueue, QueueConfig};

/// Engine scripted by file name: `fail-*` errors, `panic-*` panics, `slow-*`
/// sleeps for five seconds, `empty-*` returns no text; anything else succeeds
/// with the configured text.
pub struct ScriptedEngine {
    text: String,
}

impl ScriptedEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl OcrEngine for ScriptedEngine {
    fn recognize(&self, path: &Path) -> Result<String, EngineError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if name.starts_with("fail") {
            return Err(EngineError::Recognition("unsupported format".to_string()));
        }
        if name.starts_with("panic") {
            panic!("scripted extraction panic");
        }
        if name.starts_with("slow") {
            std::thread::sleep(Duration::from_secs(5));
        }
        if name.starts_with("empty") {
            return Ok(String::new());
        }
        Ok(self.text.clone())
    }
}

pub fn engine(text: &str) -> Arc<ScriptedEngine> {
    Arc::new(ScriptedEngine::new(text))
}

/// Isolated workspace: an uploads directory and a store path inside one
/// temporary directory.
pub struct QueueWorkspace {
    pub temp: TempDir,
    pub uploads: PathBuf,
}

impl QueueWorkspace {
    pub fn new() -> Self {
        taxscan::logging::init();
        let temp = TempDir::new().expect("create temp dir");
        let uploads = temp.path().join("uploads");
        fs::create_dir_all(&uploads).expect("create uploads dir");
        Self { temp, uploads }
    }

    pub fn store_path(&self) -> PathBuf {
        self.uploads.join("ocr-jobs.json")
    }

    pub fn config(&self) -> QueueConfig {
        QueueConfig {
            store_path: self.store_path(),
            worker_count: 2,
            ..QueueConfig::default()
        }
    }

    /// Drops a fake upload on disk and returns its path.
    pub fn upload(&self, name: &str) -> PathBuf {
        let path = self.uploads.join(name);
        fs::write(&path, b"fake receipt bytes").expect("write upload");
        path
    }
}

/// Polls `get` until the job leaves queued/processing or the deadline passes.
pub fn wait_for_terminal(queue: &OcrQueue, id: &str, deadline: Duration) -> Job {
    let started = Instant::now();
    loop {
        let job = queue.get(id).expect("job should exist");
        if job.is_terminal() {
            return job;
        }
        assert!(
            started.elapsed() < deadline,
            "job {} still {} after {:?}",
            id,
            job.status,
            deadline
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}
