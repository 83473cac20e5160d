//! Queue handle and worker tasks.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::job::SigningJob;

use super::{DispatchError, DispatcherStatus, JobExecutor, JobTicket};

/// Counters shared by the queue handle and the workers.
#[derive(Default)]
pub(super) struct PoolStats {
    queued: AtomicUsize,
    active: AtomicUsize,
    total_processed: AtomicU64,
}

/// Cloneable submission handle.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<SigningJob>,
    stats: Arc<PoolStats>,
    workers: usize,
    capacity: usize,
}

impl JobQueue {
    pub(super) fn new(
        tx: mpsc::Sender<SigningJob>,
        stats: Arc<PoolStats>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        Self {
            tx,
            stats,
            workers,
            capacity,
        }
    }

    /// Queue a job without waiting.
    ///
    /// A refused job is dropped right away, which removes its staged bundle.
    pub fn submit(&self, job: SigningJob) -> Result<JobTicket, DispatchError> {
        let ticket = JobTicket { job_id: job.job_id };

        // Count before sending so a fast worker never decrements below zero.
        self.stats.queued.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(job) {
            Ok(()) => {
                debug!(job_id = %ticket.job_id, "Job queued");
                Ok(ticket)
            }
            Err(TrySendError::Full(job)) => {
                self.stats.queued.fetch_sub(1, Ordering::SeqCst);
                warn!(job_id = %job.job_id, capacity = self.capacity, "Job queue full, rejecting");
                Err(DispatchError::QueueFull)
            }
            Err(TrySendError::Closed(job)) => {
                self.stats.queued.fetch_sub(1, Ordering::SeqCst);
                error!(job_id = %job.job_id, "Job queue closed, rejecting");
                Err(DispatchError::Closed)
            }
        }
    }

    pub fn status(&self) -> DispatcherStatus {
        DispatcherStatus {
            workers: self.workers,
            queue_capacity: self.capacity,
            queued: self.stats.queued.load(Ordering::SeqCst),
            active: self.stats.active.load(Ordering::SeqCst),
            total_processed: self.stats.total_processed.load(Ordering::SeqCst),
        }
    }
}

/// Handles of the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(super) fn new(handles: Vec<JoinHandle<()>>) -> Self {
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to drain the queue and exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("All workers stopped");
    }

    /// Stop the workers without draining the queue.
    pub fn abort(self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub(super) fn spawn_worker(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<SigningJob>>>,
    executor: Arc<dyn JobExecutor>,
    stats: Arc<PoolStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(worker = id, "Worker started");
        loop {
            let job = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                break;
            };

            stats.queued.fetch_sub(1, Ordering::SeqCst);
            stats.active.fetch_add(1, Ordering::SeqCst);
            let job_id = job.job_id;

            // A panicking job must not take the worker down with it.
            let executor = Arc::clone(&executor);
            let result = tokio::spawn(async move { executor.execute(job).await }).await;
            if let Err(e) = result {
                error!(worker = id, job_id = %job_id, error = %e, "Job panicked");
            }

            stats.active.fetch_sub(1, Ordering::SeqCst);
            stats.total_processed.fetch_add(1, Ordering::SeqCst);
        }
        debug!(worker = id, "Worker stopped");
    })
}
