//! C5 — AI Worker Pool + Admission: a fixed-size worker set consuming a
//! bounded task queue that doubles as the admission back-pressure mechanism.
//! See SPEC_FULL.md §4.5.

use crate::llm::{LlmClient, LlmError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long `shutdown` waits for in-flight workers to drain before giving up.
pub const SHUTDOWN_DRAIN_SECS: u64 = 10;

pub struct AiTask {
    pub sample: BTreeMap<String, Vec<String>>,
    pub sender_count: usize,
    pub deadline: Instant,
    pub respond_to: oneshot::Sender<Result<String, LlmError>>,
}

/// `{status, ai_tasks_queued, ai_tasks_processing, ai_tasks_worker_capacity}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub ai_tasks_queued: usize,
    pub ai_tasks_processing: usize,
    pub ai_tasks_worker_capacity: usize,
}

pub struct AiWorkerPool {
    task_tx: tokio::sync::Mutex<Option<mpsc::Sender<AiTask>>>,
    worker_handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    queued: Arc<AtomicUsize>,
    processing: Arc<AtomicUsize>,
    worker_capacity: usize,
}

impl AiWorkerPool {
    /// Spawn `worker_count` worker tasks consuming a bounded channel of
    /// capacity `worker_count` (the channel itself is the admission queue).
    pub fn spawn(worker_count: usize, client: Arc<LlmClient>) -> Arc<Self> {
        let (task_tx, task_rx) = mpsc::channel(worker_count.max(1));
        let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));
        let queued = Arc::new(AtomicUsize::new(0));
        let processing = Arc::new(AtomicUsize::new(0));

        let mut worker_handles = Vec::with_capacity(worker_count.max(1));
        for id in 0..worker_count.max(1) {
            let task_rx = task_rx.clone();
            let client = client.clone();
            let queued = queued.clone();
            let processing = processing.clone();
            worker_handles.push(tokio::spawn(async move {
                worker_loop(id, task_rx, client, queued, processing).await;
            }));
        }

        Arc::new(Self {
            task_tx: tokio::sync::Mutex::new(Some(task_tx)),
            worker_handles: tokio::sync::Mutex::new(worker_handles),
            queued,
            processing,
            worker_capacity: worker_count.max(1),
        })
    }

    /// Enqueue a task, blocking up to `queue_timeout`. Returns the result
    /// receiver on success, or `None` if admission timed out or the pool has
    /// already been shut down.
    pub async fn try_submit(
        &self,
        sample: BTreeMap<String, Vec<String>>,
        sender_count: usize,
        deadline: Instant,
        queue_timeout: Duration,
    ) -> Option<oneshot::Receiver<Result<String, LlmError>>> {
        let (respond_to, rx) = oneshot::channel();
        let task = AiTask { sample, sender_count, deadline, respond_to };

        let Some(task_tx) = self.task_tx.lock().await.clone() else {
            return None;
        };

        self.queued.fetch_add(1, Ordering::SeqCst);
        match tokio::time::timeout(queue_timeout, task_tx.send(task)).await {
            Ok(Ok(())) => Some(rx),
            Ok(Err(_)) => {
                self.queued.fetch_sub(1, Ordering::SeqCst);
                None
            }
            Err(_) => {
                self.queued.fetch_sub(1, Ordering::SeqCst);
                None
            }
        }
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            ai_tasks_queued: self.queued.load(Ordering::SeqCst),
            ai_tasks_processing: self.processing.load(Ordering::SeqCst),
            ai_tasks_worker_capacity: self.worker_capacity,
        }
    }

    /// Stop accepting new work and wait up to `drain_timeout` for in-flight
    /// workers to finish. Closing `task_tx` makes every worker's `recv()`
    /// return `None` once the queue empties, ending `worker_loop` cleanly.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.task_tx.lock().await.take();

        let handles = std::mem::take(&mut *self.worker_handles.lock().await);
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            eprintln!("⚠️  AI worker pool did not drain within {drain_timeout:?}; shutting down anyway");
        }
    }
}

async fn worker_loop(
    _id: usize,
    task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<AiTask>>>,
    client: Arc<LlmClient>,
    queued: Arc<AtomicUsize>,
    processing: Arc<AtomicUsize>,
) {
    loop {
        let task = {
            let mut rx = task_rx.lock().await;
            rx.recv().await
        };
        let Some(task) = task else {
            break;
        };
        queued.fetch_sub(1, Ordering::SeqCst);
        processing.fetch_add(1, Ordering::SeqCst);

        let remaining = task.deadline.saturating_duration_since(Instant::now());
        let result = match tokio::time::timeout(remaining, client.analyze(&task.sample, task.sender_count)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Cancelled),
        };

        processing.fetch_sub(1, Ordering::SeqCst);
        let _ = task.respond_to.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn health_reports_worker_capacity() {
        let config = AppConfig::default();
        let client = Arc::new(LlmClient::new(&config));
        let pool = AiWorkerPool::spawn(3, client);
        let report = pool.health();
        assert_eq!(report.ai_tasks_worker_capacity, 3);
        assert_eq!(report.ai_tasks_processing, 0);
        assert!(report.ai_tasks_processing <= report.ai_tasks_worker_capacity);
    }

    #[tokio::test]
    async fn submit_without_credentials_still_enqueues_and_resolves() {
        let config = AppConfig::default();
        let client = Arc::new(LlmClient::new(&config));
        let pool = AiWorkerPool::spawn(1, client);
        let deadline = Instant::now() + Duration::from_secs(5);
        let rx = pool
            .try_submit(BTreeMap::new(), 2, deadline, Duration::from_secs(1))
            .await
            .expect("admission should succeed under capacity");
        let result = rx.await.expect("worker should respond");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_work_and_closes_admission() {
        let config = AppConfig::default();
        let client = Arc::new(LlmClient::new(&config));
        let pool = AiWorkerPool::spawn(1, client);
        let deadline = Instant::now() + Duration::from_secs(5);

        let rx = pool
            .try_submit(BTreeMap::new(), 2, deadline, Duration::from_secs(1))
            .await
            .expect("admission should succeed before shutdown");

        pool.shutdown(Duration::from_secs(SHUTDOWN_DRAIN_SECS)).await;

        assert!(rx.await.expect("worker should have drained before exiting").is_err());
        assert!(pool
            .try_submit(BTreeMap::new(), 2, deadline, Duration::from_millis(100))
            .await
            .is_none());
    }
}
