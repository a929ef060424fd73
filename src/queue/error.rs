use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("url {0} is not in-flight for this job")]
    NotInFlight(i64),

    #[error("unknown url id {0}")]
    UnknownUrl(i64),
}
