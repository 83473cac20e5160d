//! Bounded job queue feeding a fixed pool of workers.
//!
//! The request boundary holds a cloneable [`JobQueue`] and gets a
//! [`JobTicket`] back as soon as a job is queued. Workers pull jobs one at a
//! time and run each to completion. A full queue refuses the submission
//! instead of blocking the caller.

mod pool;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::job::SigningJob;

pub use pool::{JobQueue, WorkerPool};
use pool::{spawn_worker, PoolStats};

/// Something that can run a signing job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: SigningJob);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Every worker is busy and the queue is at capacity.
    #[error("Job queue is full")]
    QueueFull,

    /// The workers have shut down.
    #[error("Job queue is closed")]
    Closed,
}

/// Acknowledgment that a job was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobTicket {
    pub job_id: Uuid,
}

/// Point-in-time view of the pool, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStatus {
    pub workers: usize,
    pub queue_capacity: usize,
    pub queued: usize,
    pub active: usize,
    pub total_processed: u64,
}

/// Create the queue and start `config.workers` workers.
///
/// Workers stop once every [`JobQueue`] clone has been dropped and the
/// remaining jobs have run; await [`WorkerPool::join`] to wait for that.
pub fn create_dispatcher(
    executor: Arc<dyn JobExecutor>,
    config: &DispatcherConfig,
) -> (JobQueue, WorkerPool) {
    let workers = config.workers.max(1);
    let capacity = config.queue_capacity.max(1);

    let (tx, rx) = mpsc::channel(capacity);
    let rx = Arc::new(Mutex::new(rx));
    let stats = Arc::new(PoolStats::default());

    let handles = (0..workers)
        .map(|id| spawn_worker(id, Arc::clone(&rx), Arc::clone(&executor), Arc::clone(&stats)))
        .collect();

    (
        JobQueue::new(tx, Arc::clone(&stats), workers, capacity),
        WorkerPool::new(handles),
    )
}
