/// Where a piece of content's bytes actually live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum StorageType {
    Inline,
    Bucketed,
    External,
}

impl StorageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Inline => "inline",
            StorageType::Bucketed => "bucketed",
            StorageType::External => "external",
        }
    }
}

/// A stable handle to a stored payload, returned by [`crate::storage::Storage::put`].
///
/// `content_sha256` is the global content-identity key: `put` is idempotent
/// on it, and a single hash may back multiple `http_responses` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub content_id: i64,
    pub content_sha256: String,
    pub storage_type: StorageType,
    pub uncompressed_size: u64,
    pub compressed_size: Option<u64>,
}
