use std::collections::HashMap;

/// A paused job's persisted shape as handed to [`super::plan_resume`].
#[derive(Debug, Clone)]
pub struct QueueSource {
    pub id: Option<String>,
    pub url: Option<String>,
    pub args: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedReason {
    MissingSource,
    AlreadyRunning,
    DomainConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Selected,
    Queued,
    Blocked(BlockedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeEntry {
    pub outcome: ResumeOutcome,
    pub domain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResumePlan {
    pub selected: Vec<String>,
    pub processed: usize,
    pub info: HashMap<String, ResumeEntry>,
    pub blocked_domains: Vec<String>,
    pub recommended_ids: Vec<String>,
}
