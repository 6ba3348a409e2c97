//! The OCR job queue.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::config::{OcrMode, QueueConfig};
use crate::engine::{OcrEngine, MOCK_OCR_TEXT};
use crate::job::{Job, JobStatus};
use crate::store::JsonStore;
use crate::worker::{OcrTask, TaskOutcome, WorkerPool};

struct QueueInner {
    jobs: RwLock<HashMap<String, Job>>,
    counter: AtomicU64,
    store: JsonStore,
    /// Serializes whole-table rewrites so concurrent completions cannot
    /// interleave half-written files.
    persist_lock: Mutex<()>,
}

impl QueueInner {
    fn next_id(&self) -> String {
        self.counter.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Job table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Job table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Rewrites the flat store from the current table. Write failures are
    /// logged and swallowed; the in-memory table stays authoritative and the
    /// next successful write catches the file up.
    fn persist(&self) {
        let _guard = match self.persist_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut jobs: Vec<Job> = self.read_jobs().values().cloned().collect();
        jobs.sort_by_key(|job| job.id.parse::<u64>().unwrap_or(u64::MAX));
        if let Err(e) = self.store.save(&jobs) {
            error!("Failed to persist OCR jobs: {}", e);
        }
    }

    /// Flips a queued job to processing and hands back its file path.
    /// `None` when the job is gone or no longer queued.
    fn mark_processing(&self, job_id: &str) -> Option<PathBuf> {
        let mut jobs = self.write_jobs();
        match jobs.get_mut(job_id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.start();
                Some(job.file_path.clone())
            }
            _ => None,
        }
    }

    /// Applies a terminal verdict: unlinks the source file, records the
    /// outcome, persists. The transition happens entirely under the table
    /// lock, so a reader never sees a terminal status with the file still
    /// present, nor a half-updated record.
    fn finish(&self, job_id: &str, verdict: Result<String, String>) {
        {
            let mut jobs = self.write_jobs();
            let job = match jobs.get_mut(job_id) {
                Some(job) => job,
                None => {
                    warn!("Outcome for unknown OCR job {}", job_id);
                    return;
                }
            };
            if job.is_terminal() {
                debug!("Ignoring duplicate outcome for OCR job {}", job_id);
                return;
            }

            remove_file_quiet(&job.file_path);
            match verdict {
                Ok(text) => {
                    debug!("OCR job {} done ({} bytes of text)", job_id, text.len());
                    job.complete(text);
                }
                Err(message) => {
                    warn!("OCR job {} failed: {}", job_id, message);
                    job.fail(message);
                }
            }
        }
        self.persist();
    }

    fn apply_outcome(&self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Done { job_id, text } => self.finish(&job_id, Ok(text)),
            TaskOutcome::Failed { job_id, error } => self.finish(&job_id, Err(error)),
        }
    }
}

/// Best-effort unlink. The filesystem not reflecting job completion is
/// tolerated; failures are never surfaced.
fn remove_file_quiet(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!("Could not remove source file '{}': {}", path.display(), e);
    }
}

/// Tracks OCR jobs from submission to terminal state and drives extraction on
/// a worker pool without blocking the caller.
///
/// Construct one per process and share it behind an `Arc`; `submit` and `get`
/// take `&self`. Jobs survive restarts through the flat store: terminal jobs
/// load unchanged, interrupted ones are re-dispatched from scratch.
pub struct OcrQueue {
    inner: Arc<QueueInner>,
    pool: WorkerPool,
    drainer: JoinHandle<()>,
    mode: OcrMode,
}

impl OcrQueue {
    /// Opens the queue: loads the persisted table, restores the id counter to
    /// one past the highest id seen, starts the workers, and re-dispatches
    /// jobs a previous process left queued or processing.
    ///
    /// # Panics
    /// Panics if `config.worker_count` is 0.
    pub fn new(config: QueueConfig, engine: Arc<dyn OcrEngine>) -> Self {
        let store = JsonStore::new(&config.store_path);
        let loaded = store.load();

        let mut max_id = 0u64;
        let mut pending = Vec::new();
        let mut jobs = HashMap::with_capacity(loaded.len());
        for mut job in loaded {
            if let Ok(numeric) = job.id.parse::<u64>() {
                max_id = max_id.max(numeric);
            }
            if !job.is_terminal() {
                job.reset_for_retry();
                pending.push(job.id.clone());
            }
            jobs.insert(job.id.clone(), job);
        }
        if !jobs.is_empty() {
            info!(
                "Loaded {} persisted OCR jobs ({} pending retry)",
                jobs.len(),
                pending.len()
            );
        }

        let inner = Arc::new(QueueInner {
            jobs: RwLock::new(jobs),
            counter: AtomicU64::new(max_id + 1),
            store,
            persist_lock: Mutex::new(()),
        });

        let pool = WorkerPool::new(engine, config.worker_count, config.job_timeout);

        let results = pool.results();
        let drain_inner = Arc::clone(&inner);
        let drainer = thread::spawn(move || {
            while let Ok(outcome) = results.recv() {
                drain_inner.apply_outcome(outcome);
            }
            debug!("OCR completion channel closed");
        });

        let queue = Self {
            inner,
            pool,
            drainer,
            mode: config.mode,
        };

        for job_id in pending {
            match queue.mode {
                // No engine runs in mock mode; interrupted jobs settle to the
                // deterministic result instead of being retried for real.
                OcrMode::Mock => queue.inner.finish(&job_id, Ok(MOCK_OCR_TEXT.to_string())),
                OcrMode::Engine => queue.dispatch(&job_id),
            }
        }

        queue
    }

    /// Registers a new job for the uploaded file and schedules extraction.
    ///
    /// The queue takes ownership of the file at `file_path` and unlinks it
    /// once the job reaches done or failed. The returned snapshot is still
    /// `queued` (or already `done` in deterministic mock mode, in which case
    /// the file is gone and the table persisted before this returns). Poll
    /// [`OcrQueue::get`] for the outcome.
    pub fn submit(
        &self,
        file_path: impl Into<PathBuf>,
        original_name: &str,
        owner_id: Option<&str>,
    ) -> Job {
        let id = self.inner.next_id();
        let job = Job::new(id.clone(), file_path.into(), original_name, owner_id);

        {
            let mut jobs = self.inner.write_jobs();
            jobs.insert(id.clone(), job.clone());
        }

        if self.mode == OcrMode::Mock {
            self.inner.finish(&id, Ok(MOCK_OCR_TEXT.to_string()));
            return self.get(&id).unwrap_or(job);
        }

        self.inner.persist();
        debug!("Queued OCR job {} for '{}'", id, original_name);
        self.dispatch(&id);
        job
    }

    /// Point-in-time snapshot of a job, `None` for unknown ids. Jobs are
    /// never evicted; terminal records stay queryable for the process
    /// lifetime.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.inner.read_jobs().get(id).cloned()
    }

    /// Moves a queued job into processing and hands it to the pool. A pool
    /// refusal fails the job immediately; nothing is retried automatically.
    fn dispatch(&self, job_id: &str) {
        let file_path = match self.inner.mark_processing(job_id) {
            Some(path) => path,
            None => {
                warn!("OCR job {} is not queued, skipping dispatch", job_id);
                return;
            }
        };
        self.inner.persist();

        let task = OcrTask {
            job_id: job_id.to_string(),
            file_path,
        };
        if let Err(e) = self.pool.dispatch(task) {
            self.inner
                .finish(job_id, Err(format!("Failed to start extraction: {}", e)));
        }
    }

    /// Stops the workers and joins the completion thread. Jobs still queued
    /// or processing stay in the table (and on disk) and are retried on the
    /// next start. Dropping the queue without calling this also winds the
    /// threads down, via channel disconnects, just less deterministically.
    pub fn shutdown(self) {
        let OcrQueue {
            inner: _,
            pool,
            drainer,
            mode: _,
        } = self;

        pool.shutdown();
        pool.wait();
        if drainer.join().is_err() {
            error!("OCR completion thread panicked");
        }
    }
}
