//! Bounded worker pool driving text extraction.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::engine::OcrEngine;
use crate::error::QueueError;

/// One extraction request handed to the pool.
#[derive(Debug, Clone)]
pub struct OcrTask {
    pub job_id: String,
    pub file_path: PathBuf,
}

/// Terminal outcome of one extraction.
#[derive(Debug)]
pub enum TaskOutcome {
    Done { job_id: String, text: String },
    Failed { job_id: String, error: String },
}

impl TaskOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            TaskOutcome::Done { job_id, .. } | TaskOutcome::Failed { job_id, .. } => job_id,
        }
    }
}

/// Fixed set of worker threads fed from an unbounded task channel.
///
/// The pool caps concurrent extraction at `worker_count`; queueing a task
/// never blocks the caller. Each task runs the engine on its own supervised
/// thread, so a panicking or (when a timeout is configured) hanging engine
/// costs one outcome, not a worker.
pub struct WorkerPool {
    task_sender: Sender<OcrTask>,
    result_receiver: Receiver<TaskOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        worker_count: usize,
        task_timeout: Option<Duration>,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (task_sender, task_receiver) = unbounded::<OcrTask>();
        let (result_sender, result_receiver) = unbounded::<TaskOutcome>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_engine = Arc::clone(&engine);

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    task_rx,
                    result_tx,
                    shutdown_flag,
                    worker_engine,
                    task_timeout,
                );
            });

            workers.push(handle);
        }

        info!("Started {} OCR workers", worker_count);

        Self {
            task_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    /// Queues a task. Fails only once the pool has shut down.
    pub fn dispatch(&self, task: OcrTask) -> Result<(), QueueError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(QueueError::PoolClosed);
        }

        self.task_sender.send(task).map_err(|_| QueueError::PoolClosed)
    }

    /// Clone of the result channel, for a completion consumer thread.
    pub fn results(&self) -> Receiver<TaskOutcome> {
        self.result_receiver.clone()
    }

    pub fn try_recv_result(&self) -> Option<TaskOutcome> {
        self.result_receiver.try_recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down OCR worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Waits for all workers to finish their current task and exit.
    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("OCR worker {} panicked: {:?}", i, e);
            } else {
                debug!("OCR worker {} finished", i);
            }
        }

        info!("All OCR workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<OcrTask>,
    result_sender: Sender<TaskOutcome>,
    shutdown: Arc<AtomicBool>,
    engine: Arc<dyn OcrEngine>,
    task_timeout: Option<Duration>,
) {
    debug!("OCR worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("OCR worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => {
                debug!("OCR worker {} processing job {}", worker_id, task.job_id);

                let outcome = run_task(&engine, task, task_timeout);
                if let Err(e) = result_sender.send(outcome) {
                    error!("OCR worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("OCR worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("OCR worker {} stopped", worker_id);
}

/// Runs one extraction on a dedicated thread and supervises it over a
/// one-shot channel. The engine is untrusted: an error return, a panic, and
/// an elapsed timeout all collapse into a `Failed` outcome.
fn run_task(engine: &Arc<dyn OcrEngine>, task: OcrTask, timeout: Option<Duration>) -> TaskOutcome {
    let OcrTask { job_id, file_path } = task;

    let (tx, rx) = bounded(1);
    let unit_engine = Arc::clone(engine);
    let unit_path = file_path;

    let spawned = thread::Builder::new()
        .name(format!("ocr-extract-{}", job_id))
        .spawn(move || {
            let _ = tx.send(unit_engine.recognize(&unit_path));
        });

    let unit = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            return TaskOutcome::Failed {
                job_id,
                error: format!("Failed to start extraction thread: {}", e),
            };
        }
    };

    let received = match timeout {
        Some(limit) => match rx.recv_timeout(limit) {
            Ok(result) => Some(result),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // The extraction thread is left detached; it holds no locks
                // and exits whenever the engine returns.
                error!("Extraction for job {} timed out after {:?}", job_id, limit);
                return TaskOutcome::Failed {
                    job_id,
                    error: format!("Extraction timed out after {:?}", limit),
                };
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => None,
        },
        None => rx.recv().ok(),
    };

    match received {
        Some(Ok(text)) => {
            let _ = unit.join();
            TaskOutcome::Done { job_id, text }
        }
        Some(Err(e)) => {
            let _ = unit.join();
            TaskOutcome::Failed {
                job_id,
                error: e.to_string(),
            }
        }
        // The sender was dropped without a message: the unit died mid-flight.
        None => {
            let error = match unit.join() {
                Err(panic) => format!(
                    "Extraction worker terminated unexpectedly: {}",
                    panic_message(panic.as_ref())
                ),
                Ok(()) => "Extraction worker terminated without reporting a result".to_string(),
            };
            TaskOutcome::Failed { job_id, error }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::path::Path;

    struct FixedEngine(&'static str);

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _path: &Path) -> Result<String, EngineError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn recognize(&self, _path: &Path) -> Result<String, EngineError> {
            Err(EngineError::Recognition("unsupported format".to_string()))
        }
    }

    struct PanickingEngine;

    impl OcrEngine for PanickingEngine {
        fn recognize(&self, _path: &Path) -> Result<String, EngineError> {
            panic!("engine blew up");
        }
    }

    struct SlowEngine;

    impl OcrEngine for SlowEngine {
        fn recognize(&self, _path: &Path) -> Result<String, EngineError> {
            thread::sleep(Duration::from_secs(5));
            Ok("too late".to_string())
        }
    }

    fn task(id: &str) -> OcrTask {
        OcrTask {
            job_id: id.to_string(),
            file_path: PathBuf::from(format!("/tmp/upload-{}", id)),
        }
    }

    fn recv(pool: &WorkerPool) -> TaskOutcome {
        pool.results()
            .recv_timeout(Duration::from_secs(5))
            .expect("outcome within deadline")
    }

    #[test]
    fn test_pool_creation_and_shutdown() {
        let pool = WorkerPool::new(Arc::new(FixedEngine("ok")), 2, None);
        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(pool.dispatch(task("1")).is_err());

        pool.wait();
    }

    #[test]
    fn test_successful_extraction() {
        let pool = WorkerPool::new(Arc::new(FixedEngine("Invoice #1")), 1, None);
        pool.dispatch(task("1")).unwrap();

        match recv(&pool) {
            TaskOutcome::Done { job_id, text } => {
                assert_eq!(job_id, "1");
                assert_eq!(text, "Invoice #1");
            }
            other => panic!("Expected Done, got {:?}", other),
        }

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_engine_error_becomes_failed_outcome() {
        let pool = WorkerPool::new(Arc::new(FailingEngine), 1, None);
        pool.dispatch(task("1")).unwrap();

        match recv(&pool) {
            TaskOutcome::Failed { job_id, error } => {
                assert_eq!(job_id, "1");
                assert!(error.contains("unsupported format"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_panicking_engine_reports_termination() {
        let pool = WorkerPool::new(Arc::new(PanickingEngine), 1, None);
        pool.dispatch(task("1")).unwrap();

        match recv(&pool) {
            TaskOutcome::Failed { error, .. } => {
                assert!(error.contains("terminated unexpectedly"), "got: {}", error);
                assert!(error.contains("engine blew up"), "got: {}", error);
            }
            other => panic!("Expected Failed, got {:?}", other),
        }

        // The worker survives the panic and keeps serving.
        pool.dispatch(task("2")).unwrap();
        assert!(matches!(recv(&pool), TaskOutcome::Failed { .. }));

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_timeout_fails_the_task() {
        let pool = WorkerPool::new(Arc::new(SlowEngine), 1, Some(Duration::from_millis(50)));
        pool.dispatch(task("1")).unwrap();

        match recv(&pool) {
            TaskOutcome::Failed { error, .. } => {
                assert!(error.contains("timed out"), "got: {}", error);
            }
            other => panic!("Expected Failed, got {:?}", other),
        }

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_many_tasks_complete_in_some_order() {
        let pool = WorkerPool::new(Arc::new(FixedEngine("text")), 2, None);
        for i in 0..8 {
            pool.dispatch(task(&i.to_string())).unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(recv(&pool).job_id().to_string());
        }
        seen.sort_by_key(|id| id.parse::<u64>().unwrap());
        let expected: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);

        pool.shutdown();
        pool.wait();
    }
}
