use chrono::{DateTime, Utc};

/// A URL's lifecycle state within one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlState {
    New,
    Queued,
    InFlight,
    Completed,
    ErrorRetriable,
    ErrorTerminal,
}

impl UrlState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, UrlState::Completed | UrlState::ErrorTerminal)
    }

    #[must_use]
    pub fn is_dedup_blocking(self) -> bool {
        matches!(self, UrlState::Queued | UrlState::InFlight | UrlState::Completed)
    }
}

/// Where a queued URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Seed,
    Sitemap,
    Link,
    PatternProbe,
}

impl Origin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Seed => "seed",
            Origin::Sitemap => "sitemap",
            Origin::Link => "link",
            Origin::PatternProbe => "pattern_probe",
        }
    }
}

/// Why a URL is in the frontier right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Frontier,
    Retry,
    Probe,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Frontier => "frontier",
            Role::Retry => "retry",
            Role::Probe => "probe",
        }
    }
}

/// An entry in a job's queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub url_id: i64,
    pub url: String,
    pub host: String,
    pub depth: u32,
    pub origin: Origin,
    pub role: Role,
    pub retry_count: u32,
    pub not_before: Option<DateTime<Utc>>,
}

/// Append-only audit action recorded alongside every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Enqueued,
    Dequeued,
    Skipped,
    Error,
    Milestone,
}

impl QueueAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueueAction::Enqueued => "enqueued",
            QueueAction::Dequeued => "dequeued",
            QueueAction::Skipped => "skipped",
            QueueAction::Error => "error",
            QueueAction::Milestone => "milestone",
        }
    }
}

/// A single row to be persisted to `queue_events`.
#[derive(Debug, Clone)]
pub struct QueueEvent {
    pub job_id: String,
    pub ts: DateTime<Utc>,
    pub action: QueueAction,
    pub url_id: Option<i64>,
    pub depth: Option<u32>,
    pub host: Option<String>,
    pub reason: Option<String>,
    pub queue_size: usize,
    pub origin: Option<Origin>,
    pub role: Option<Role>,
    pub depth_bucket: Option<String>,
}
