use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown compression type: {0}")]
    UnknownCompressionType(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("bucket {0} is not active")]
    BucketNotActive(i64),

    #[error("content {0} not found")]
    NotFound(String),

    #[error("compression task failed: {0}")]
    CompressionTaskFailed(String),
}
