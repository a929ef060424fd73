//! Append-only bucket files on disk.
//!
//! A bucket is a single flat file that compressed entries are appended to.
//! Per spec.md §4.1: a partial append must never produce a readable entry,
//! so the write+fsync happens before the caller commits the `bucket_entries`
//! row; on reopen, bytes past the last committed offset are truncated.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::StorageError;

pub fn bucket_file_path(storage_dir: &Path, bucket_id: i64) -> PathBuf {
    storage_dir.join("buckets").join(format!("{bucket_id}.bin"))
}

/// Append `bytes` to the bucket file, fsync, and return `(offset, len)`.
///
/// Runs on the blocking pool: file I/O plus an explicit fsync is not
/// something we want on the async executor thread.
pub async fn append(path: PathBuf, bytes: Vec<u8>) -> Result<(u64, u64), StorageError> {
    tokio::task::spawn_blocking(move || -> Result<(u64, u64), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let offset = file.metadata()?.len();
        file.write_all(&bytes)?;
        file.sync_data()?;
        Ok((offset, bytes.len() as u64))
    })
    .await
    .map_err(|e| StorageError::CompressionTaskFailed(e.to_string()))?
}

/// Read exactly `len` bytes starting at `offset`.
pub async fn read_range(path: PathBuf, offset: u64, len: u64) -> Result<Vec<u8>, StorageError> {
    tokio::task::spawn_blocking(move || -> Result<Vec<u8>, StorageError> {
        let mut file = std::fs::File::open(&path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    })
    .await
    .map_err(|e| StorageError::CompressionTaskFailed(e.to_string()))?
}

/// Truncate the bucket file back to `committed_len`, discarding any bytes
/// written by an append whose `bucket_entries` row never committed.
pub async fn truncate_to(path: PathBuf, committed_len: u64) -> Result<(), StorageError> {
    tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
        if !path.exists() {
            return Ok(());
        }
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.set_len(committed_len)?;
        Ok(())
    })
    .await
    .map_err(|e| StorageError::CompressionTaskFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = bucket_file_path(dir.path(), 1);

        let (off_a, len_a) = append(path.clone(), b"hello".to_vec()).await.unwrap();
        let (off_b, len_b) = append(path.clone(), b"world!".to_vec()).await.unwrap();
        assert_eq!(off_a, 0);
        assert_eq!(off_b, len_a);

        let a = read_range(path.clone(), off_a, len_a).await.unwrap();
        let b = read_range(path.clone(), off_b, len_b).await.unwrap();
        assert_eq!(a, b"hello");
        assert_eq!(b, b"world!");
    }

    #[tokio::test]
    async fn truncate_discards_uncommitted_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = bucket_file_path(dir.path(), 7);

        let (_, committed_len) = append(path.clone(), b"committed".to_vec()).await.unwrap();
        append(path.clone(), b"orphaned".to_vec()).await.unwrap();

        truncate_to(path.clone(), committed_len).await.unwrap();

        let data = read_range(path, 0, committed_len).await.unwrap();
        assert_eq!(data, b"committed");
    }
}
