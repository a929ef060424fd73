use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {job_id} is {status}, cannot {action}")]
    InvalidTransition {
        job_id: String,
        status: String,
        action: String,
    },
}
