//! Crate-wide error types.
//!
//! Each component owns a leaf error enum; `CrateError` unifies them at
//! orchestration boundaries via `#[from]` conversions, mirroring the
//! teacher's `CrawlError` + `anyhow::Result<T>` split.

use thiserror::Error;

use crate::analyzer::AnalyzerError;
use crate::fetch::FetchError;
use crate::planner::PlannerError;
use crate::places::PlacesError;
use crate::queue::QueueError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum CrateError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("place resolver error: {0}")]
    Places(#[from] PlacesError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrateError {
    /// Exit code a CLI collaborator should return for this error, per
    /// spec.md §6 (0 success, 1 generic failure, 2 database unavailable).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CrateError::Database(_) => 2,
            _ => 1,
        }
    }
}

pub type CrateResult<T> = Result<T, CrateError>;
