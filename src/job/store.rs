use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::job::model::{JobHandle, JobOutput, JobStatus, StatusResponse};

struct JobRecord {
    status: watch::Sender<JobStatus>,
    output: Option<JobOutput>,
    error: Option<String>,
    submitted_at: Instant,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl JobRecord {
    fn snapshot(&self, id: &JobHandle) -> StatusResponse {
        let status = *self.status.borrow();
        let millis = |from: Instant, to: Instant| to.duration_since(from).as_millis() as u64;

        StatusResponse {
            id: id.clone(),
            status,
            output: self.output.clone(),
            error: self.error.clone(),
            delay_time: self.started_at.map(|s| millis(self.submitted_at, s)),
            execution_time: self
                .started_at
                .zip(self.finished_at)
                .map(|(s, f)| millis(s, f)),
        }
    }
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobCounts {
    pub in_queue: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

/// In-memory job table shared between the HTTP layer and the workers.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<JobHandle, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self) -> JobHandle {
        let id = JobHandle::generate();
        let (status, _) = watch::channel(JobStatus::InQueue);
        self.jobs.insert(
            id.clone(),
            JobRecord {
                status,
                output: None,
                error: None,
                submitted_at: Instant::now(),
                started_at: None,
                finished_at: None,
            },
        );
        id
    }

    pub fn mark_in_progress(&self, id: &JobHandle) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.started_at = Some(Instant::now());
            record.status.send_replace(JobStatus::InProgress);
        }
    }

    /// Moves a job into its terminal state. Later calls for the same job are ignored.
    pub fn finish(&self, id: &JobHandle, outcome: Result<JobOutput, String>) -> Option<StatusResponse> {
        let mut record = self.jobs.get_mut(id)?;
        if record.status.borrow().is_terminal() {
            return None;
        }

        let now = Instant::now();
        record.started_at.get_or_insert(now);
        record.finished_at = Some(now);
        let status = match outcome {
            Ok(output) => {
                record.output = Some(output);
                JobStatus::Completed
            }
            Err(error) => {
                record.error = Some(error);
                JobStatus::Failed
            }
        };
        record.status.send_replace(status);
        Some(record.snapshot(id))
    }

    pub fn snapshot(&self, id: &JobHandle) -> Option<StatusResponse> {
        self.jobs.get(id).map(|record| record.snapshot(id))
    }

    pub fn subscribe(&self, id: &JobHandle) -> Option<watch::Receiver<JobStatus>> {
        self.jobs.get(id).map(|record| record.status.subscribe())
    }

    /// Drops finished jobs whose retention window has passed.
    pub fn purge_expired(&self, retention: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, record| {
            record
                .finished_at
                .map_or(true, |finished| finished.elapsed() < retention)
        });
        before.saturating_sub(self.jobs.len())
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for record in self.jobs.iter() {
            match *record.status.borrow() {
                JobStatus::InQueue | JobStatus::Unknown => counts.in_queue += 1,
                JobStatus::InProgress => counts.in_progress += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut => {
                    counts.failed += 1
                }
            }
        }
        counts
    }
}
