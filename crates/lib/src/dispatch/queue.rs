//! Bounded work queue for accepted webhook batches, drained by a fixed pool of worker tasks.
//!
//! `submit` waits a bounded time for queue capacity, never for a job to finish; a queue that
//! stays full past that bound is reported as `Full`. Each job runs in its own task so a
//! panicking job is logged and the worker keeps going.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// One accepted `POST /callback`: raw body and the signature header it came with.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub body: Bytes,
    pub signature: Option<String>,
}

/// Processes webhook jobs taken off the queue.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: WebhookJob);
}

/// Longest `submit` waits for a free slot before giving up.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("work queue is closed")]
    Closed,
    #[error("work queue is full")]
    Full,
}

/// Queue handle shared with the HTTP handlers.
pub struct WorkQueue {
    tx: RwLock<Option<mpsc::Sender<WebhookJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    submit_timeout: Duration,
}

impl WorkQueue {
    /// Start `workers` tasks (at least one) draining a queue of `capacity` jobs (at least one).
    pub fn start(handler: Arc<dyn JobHandler>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|n| {
                let rx = rx.clone();
                let handler = handler.clone();
                tokio::spawn(run_worker(n, rx, handler))
            })
            .collect();
        log::info!(
            "work queue started: {} worker(s), capacity {}",
            workers.max(1),
            capacity.max(1)
        );
        Self {
            tx: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Override how long `submit` waits for capacity (default [`DEFAULT_SUBMIT_TIMEOUT`]).
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Enqueue a job. Waits at most the submit timeout while the queue is full, then fails
    /// with `Full`; fails with `Closed` once the queue is shut down.
    pub async fn submit(&self, job: WebhookJob) -> Result<(), QueueError> {
        let tx = self.tx.read().await.clone().ok_or(QueueError::Closed)?;
        tx.send_timeout(job, self.submit_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => QueueError::Full,
                SendTimeoutError::Closed(_) => QueueError::Closed,
            })
    }

    /// Stop accepting jobs, let workers drain what is queued, and wait for them.
    pub async fn shutdown(&self) {
        self.tx.write().await.take();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for h in handles {
            let _ = h.await;
        }
        log::info!("work queue drained");
    }
}

async fn run_worker(
    n: usize,
    rx: Arc<Mutex<mpsc::Receiver<WebhookJob>>>,
    handler: Arc<dyn JobHandler>,
) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else { break };
        let handler = handler.clone();
        let res = tokio::spawn(async move { handler.handle(job).await }).await;
        if let Err(e) = res {
            log::error!("worker {}: webhook job failed: {}", n, e);
        }
    }
    log::debug!("worker {} stopped", n);
}
