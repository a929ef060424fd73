#[derive(Debug, thiserror::Error)]
pub enum PlacesError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unknown place id {0}")]
    UnknownPlace(i64),
}
