//! Compression backends for bucketed storage.
//!
//! Mirrors the teacher's `spawn_blocking` + timeout pattern for CPU-bound
//! compression work, generalized to the two algorithms named in spec.md's
//! `compression_types` table.

use std::io::{Read, Write};
use std::time::Duration;

use tokio::task::JoinError;
use tokio::time::timeout;

use super::error::StorageError;

/// Compression work larger than this runs its own blocking timeout; kept
/// generous since bucket entries can be full article pages.
const BLOCKING_COMPRESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    Gzip,
    Zstd,
}

impl CompressionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionKind::Gzip => "gzip",
            CompressionKind::Zstd => "zstd",
        }
    }

    pub fn parse(name: &str) -> Result<Self, StorageError> {
        match name {
            "gzip" => Ok(CompressionKind::Gzip),
            "zstd" => Ok(CompressionKind::Zstd),
            other => Err(StorageError::UnknownCompressionType(other.to_string())),
        }
    }
}

/// Compress `bytes` at `level` on the blocking thread pool.
pub async fn compress(
    kind: CompressionKind,
    bytes: Vec<u8>,
    level: i32,
) -> Result<Vec<u8>, StorageError> {
    let task = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, StorageError> {
        match kind {
            CompressionKind::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(
                    Vec::new(),
                    flate2::Compression::new(level.clamp(0, 9) as u32),
                );
                encoder.write_all(&bytes)?;
                Ok(encoder.finish()?)
            }
            CompressionKind::Zstd => {
                zstd::stream::encode_all(bytes.as_slice(), level).map_err(StorageError::Io)
            }
        }
    });

    match timeout(BLOCKING_COMPRESSION_TIMEOUT, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(join_error(join_err)),
        Err(_) => Err(StorageError::CompressionTaskFailed(format!(
            "compression timed out after {BLOCKING_COMPRESSION_TIMEOUT:?}"
        ))),
    }
}

/// Decompress `bytes` on the blocking thread pool.
pub async fn decompress(kind: CompressionKind, bytes: Vec<u8>) -> Result<Vec<u8>, StorageError> {
    let task = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, StorageError> {
        match kind {
            CompressionKind::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionKind::Zstd => {
                zstd::stream::decode_all(bytes.as_slice()).map_err(StorageError::Io)
            }
        }
    });

    match timeout(BLOCKING_COMPRESSION_TIMEOUT, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(join_error(join_err)),
        Err(_) => Err(StorageError::CompressionTaskFailed(format!(
            "decompression timed out after {BLOCKING_COMPRESSION_TIMEOUT:?}"
        ))),
    }
}

fn join_error(err: JoinError) -> StorageError {
    StorageError::CompressionTaskFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zstd_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = compress(CompressionKind::Zstd, data.clone(), 3).await.unwrap();
        let decompressed = decompress(CompressionKind::Zstd, compressed).await.unwrap();
        assert_eq!(decompressed, data);
    }

    #[tokio::test]
    async fn gzip_round_trips() {
        let data = b"lorem ipsum dolor sit amet".repeat(50);
        let compressed = compress(CompressionKind::Gzip, data.clone(), 6).await.unwrap();
        let decompressed = decompress(CompressionKind::Gzip, compressed).await.unwrap();
        assert_eq!(decompressed, data);
    }
}
