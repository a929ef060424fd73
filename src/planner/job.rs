use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::queue::JobQueue;

use super::stage::PlannerStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Paused,
    Done,
    Aborted,
    Error,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Done => "done",
            JobStatus::Aborted => "aborted",
            JobStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "paused" => JobStatus::Paused,
            "done" => JobStatus::Done,
            "aborted" => JobStatus::Aborted,
            "error" => JobStatus::Error,
            _ => JobStatus::Running,
        }
    }
}

/// A single job's live state: its stage, cancellation token, and frontier
/// queue. `status`/`stage` use atomics so `getJob` can read them without a
/// lock while the planner task owns the write side.
pub struct CrawlJob {
    pub id: String,
    pub seed_url: String,
    pub started_at: DateTime<Utc>,
    pub queue: Arc<JobQueue>,
    pub cancellation: CancellationToken,
    status: parking_lot::Mutex<JobStatus>,
    stage_seq: AtomicU32,
    stage: parking_lot::Mutex<PlannerStage>,
}

impl CrawlJob {
    #[must_use]
    pub fn new(id: String, seed_url: String, queue: Arc<JobQueue>) -> Self {
        Self {
            id,
            seed_url,
            started_at: Utc::now(),
            queue,
            cancellation: CancellationToken::new(),
            status: parking_lot::Mutex::new(JobStatus::Running),
            stage_seq: AtomicU32::new(0),
            stage: parking_lot::Mutex::new(PlannerStage::Startup),
        }
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: JobStatus) {
        *self.status.lock() = status;
    }

    #[must_use]
    pub fn stage(&self) -> PlannerStage {
        *self.stage.lock()
    }

    pub fn set_stage(&self, stage: PlannerStage) {
        *self.stage.lock() = stage;
    }

    pub fn next_stage_sequence(&self) -> u32 {
        self.stage_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn pause(&self) {
        self.set_status(JobStatus::Paused);
    }

    pub fn cancel(&self) {
        self.set_status(JobStatus::Aborted);
        self.cancellation.cancel();
    }

    pub fn finish(&self) {
        self.set_status(JobStatus::Done);
    }
}
