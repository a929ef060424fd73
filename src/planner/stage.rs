use chrono::{DateTime, Utc};

/// A job's position in `startup → discovery → fetch-loop → extract →
/// shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerStage {
    Startup,
    Discovery,
    FetchLoop,
    Extract,
    Shutdown,
}

impl PlannerStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlannerStage::Startup => "startup",
            PlannerStage::Discovery => "discovery",
            PlannerStage::FetchLoop => "fetch_loop",
            PlannerStage::Extract => "extract",
            PlannerStage::Shutdown => "shutdown",
        }
    }

    #[must_use]
    pub fn next(self) -> Option<PlannerStage> {
        match self {
            PlannerStage::Startup => Some(PlannerStage::Discovery),
            PlannerStage::Discovery => Some(PlannerStage::FetchLoop),
            PlannerStage::FetchLoop => Some(PlannerStage::Extract),
            PlannerStage::Extract => Some(PlannerStage::Shutdown),
            PlannerStage::Shutdown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Entered,
    Completed,
    Failed,
}

impl StageStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Entered => "entered",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
        }
    }
}

/// A row to be persisted to `planner_stage_events`.
#[derive(Debug, Clone)]
pub struct PlannerStageEvent {
    pub job_id: String,
    pub ts: DateTime<Utc>,
    pub stage: PlannerStage,
    pub status: StageStatus,
    pub sequence: u32,
    pub duration_ms: Option<u64>,
    pub details: Option<String>,
}
