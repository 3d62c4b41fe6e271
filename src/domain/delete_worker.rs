//! Background soft-delete pipeline.
//!
//! Request handlers call [`DeletionPipeline::submit`], which queues a
//! [`DeleteJob`] without waiting on storage. A fixed pool of worker tasks
//! drains the shared queue and applies each job with
//! [`ShortUrlRepository::soft_delete`].
//!
//! Delivery is best-effort: a failed job is logged with its owner, ids and
//! error and is not retried, and queued jobs are lost if the process dies.
//! [`DeletionPipeline::shutdown`] stops intake and waits for every queued job.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::delete_job::DeleteJob;
use crate::domain::repositories::ShortUrlRepository;

/// Reasons a job is not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("deletion queue is full")]
    QueueFull,

    #[error("deletion pipeline is shutting down")]
    ShuttingDown,
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<DeleteJob>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded queue plus worker pool applying soft deletes.
///
/// Must be started inside a Tokio runtime.
pub struct DeletionPipeline {
    sender: Mutex<Option<mpsc::Sender<DeleteJob>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns `workers` worker tasks sharing a queue of `capacity` jobs.
    ///
    /// Zero values are raised to one.
    pub fn start(
        repository: Arc<dyn ShortUrlRepository>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue: SharedQueue = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_delete_worker(
                    worker_id,
                    queue.clone(),
                    repository.clone(),
                ))
            })
            .collect::<Vec<_>>();

        info!(workers = handles.len(), capacity, "Deletion pipeline started");

        Self {
            sender: Mutex::new(Some(tx)),
            workers: tokio::sync::Mutex::new(handles),
        }
    }

    /// Queues a soft delete of `ids` for `owner_id`.
    ///
    /// Never waits on storage; the only blocking is the brief lock around the
    /// push. An empty `ids` list is accepted and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueFull`] when the queue is at capacity and
    /// [`PipelineError::ShuttingDown`] after [`Self::shutdown`] was called.
    pub fn submit(
        &self,
        owner_id: impl Into<String>,
        ids: Vec<String>,
    ) -> Result<(), PipelineError> {
        let job = DeleteJob::new(owner_id, ids);
        if job.is_empty() {
            return Ok(());
        }

        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(PipelineError::ShuttingDown);
        };

        match sender.try_send(job) {
            Ok(()) => {
                metrics::counter!("delete_jobs_submitted_total").increment(1);
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                metrics::counter!("delete_jobs_rejected_total").increment(1);
                warn!(
                    owner_id = %job.owner_id,
                    ids = job.ids.len(),
                    "Deletion queue is full, rejecting job"
                );
                Err(PipelineError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(PipelineError::ShuttingDown),
        }
    }

    /// Stops accepting jobs and waits until every queued job has been applied.
    ///
    /// Concurrent and repeated calls all return only once the drain is done.
    pub async fn shutdown(&self) {
        // Dropping the only sender lets workers drain the queue and then exit.
        drop(lock(&self.sender).take());

        let mut workers = self.workers.lock().await;
        if workers.is_empty() {
            return;
        }

        info!(workers = workers.len(), "Draining deletion pipeline");
        for handle in workers.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Delete worker terminated abnormally");
            }
        }
        info!("Deletion pipeline stopped");
    }
}

/// Pops jobs from the shared queue until it is closed and empty.
///
/// The queue lock is held only while waiting for the next job, never while
/// the job is applied.
async fn run_delete_worker(
    worker_id: usize,
    queue: SharedQueue,
    repository: Arc<dyn ShortUrlRepository>,
) {
    debug!(worker_id, "Delete worker started");

    loop {
        let job = queue.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        apply_job(worker_id, repository.as_ref(), job).await;
    }

    debug!(worker_id, "Delete worker stopped");
}

async fn apply_job(worker_id: usize, repository: &dyn ShortUrlRepository, job: DeleteJob) {
    match repository.soft_delete(&job.owner_id, &job.ids).await {
        Ok(()) => {
            metrics::counter!("delete_jobs_applied_total").increment(1);
            debug!(
                worker_id,
                owner_id = %job.owner_id,
                ids = job.ids.len(),
                "Delete job applied"
            );
        }
        Err(e) => {
            metrics::counter!("delete_jobs_failed_total").increment(1);
            error!(
                worker_id,
                owner_id = %job.owner_id,
                ids = ?job.ids,
                error = %e,
                "Failed to apply delete job"
            );
        }
    }
}
