#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("empty document body")]
    EmptyDocument,
}
