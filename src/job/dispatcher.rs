use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::handler::Handler;
use crate::job::forward::ResultForwarder;
use crate::job::input::TranscriptionRequest;
use crate::job::model::{JobHandle, JobOutput, StatusResponse};
use crate::job::store::{JobCounts, JobStore};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerCounts {
    pub max: usize,
    pub idle: usize,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherHealth {
    pub jobs: JobCounts,
    pub workers: WorkerCounts,
}

/// Accepts jobs, runs them on a bounded number of workers and records their
/// outcome in the [`JobStore`].
#[derive(Clone)]
pub struct Dispatcher {
    store: JobStore,
    handler: Arc<Handler>,
    workers: Arc<Semaphore>,
    max_workers: usize,
    execution_timeout: Duration,
    forwarder: Option<ResultForwarder>,
}

impl Dispatcher {
    pub fn new(handler: Handler, max_workers: usize, execution_timeout: Duration) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            store: JobStore::new(),
            handler: Arc::new(handler),
            workers: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            execution_timeout,
            forwarder: None,
        }
    }

    pub fn with_forwarder(mut self, forwarder: ResultForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Records the job and schedules it. Returns as soon as the job is queued.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn submit(&self, request: TranscriptionRequest) -> JobHandle {
        let id = self.store.insert();
        tracing::info!(job_id = %id, "Job queued");

        let dispatcher = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move { dispatcher.execute(job_id, request).await });
        id
    }

    pub fn status(&self, id: &JobHandle) -> Option<StatusResponse> {
        self.store.snapshot(id)
    }

    /// Waits up to `wait` for the job to finish and returns its latest status.
    pub async fn wait(&self, id: &JobHandle, wait: Duration) -> Option<StatusResponse> {
        let mut receiver = self.store.subscribe(id)?;
        let finished = receiver.wait_for(|status| status.is_terminal());
        if tokio::time::timeout(wait, finished).await.is_err() {
            tracing::debug!(job_id = %id, "Job still running after {:?}", wait);
        }
        self.store.snapshot(id)
    }

    pub fn health(&self) -> DispatcherHealth {
        DispatcherHealth {
            jobs: self.store.counts(),
            workers: WorkerCounts {
                max: self.max_workers,
                idle: self.workers.available_permits(),
            },
        }
    }

    /// Periodically drops finished jobs older than `retention`.
    pub fn spawn_reaper(&self, retention: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = store.purge_expired(retention);
                if purged > 0 {
                    tracing::debug!("Purged {} expired jobs", purged);
                }
            }
        })
    }

    #[tracing::instrument(level = "info", skip(self, request), fields(job_id = %id))]
    async fn execute(self, id: JobHandle, request: TranscriptionRequest) {
        let outcome = match self.workers.clone().acquire_owned().await {
            Ok(_permit) => {
                self.store.mark_in_progress(&id);
                self.run_handler(request).await
            }
            Err(_) => Err("worker pool is shut down".to_string()),
        };

        match &outcome {
            Ok(_) => tracing::info!("Job completed"),
            Err(e) => tracing::error!("Job failed: {}", e),
        }

        let Some(result) = self.store.finish(&id, outcome) else {
            return;
        };
        if let Some(forwarder) = &self.forwarder {
            forwarder.forward(&result).await;
        }
    }

    /// Runs the handler on its own task so a panic fails the job instead of
    /// leaving it in progress.
    async fn run_handler(&self, request: TranscriptionRequest) -> Result<JobOutput, String> {
        let handler = self.handler.clone();
        let task = tokio::spawn(async move { handler.handle(request).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.execution_timeout, task).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(format!("{:#}", e)),
            Ok(Err(join_error)) => Err(format!("handler crashed: {}", join_error)),
            Err(_) => {
                abort.abort();
                Err(format!(
                    "execution timed out after {:?}",
                    self.execution_timeout
                ))
            }
        }
    }
}
