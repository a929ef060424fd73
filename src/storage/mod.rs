//! Content-addressed storage engine with bucketed compression.
//!
//! Grounded on the teacher's `content_saver::compression` module (atomic
//! temp-file-then-rename writes, `spawn_blocking` for compression, xxhash
//! for cheap integrity checks) but keyed on SHA-256 content identity with
//! explicit inline-vs-bucketed storage policy instead of always-gzip.

mod bucket;
mod compression;
mod engine;
mod error;
mod types;

pub use compression::CompressionKind;
pub use engine::Storage;
pub use error::StorageError;
pub use types::{ContentRef, StorageType};
