use std::path::PathBuf;

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use super::bucket;
use super::compression::{self, CompressionKind};
use super::error::StorageError;
use super::types::{ContentRef, StorageType};

/// Content-addressed storage: `put`/`get`/`seal` over a SQLite-backed
/// catalog plus append-only bucket files on disk.
///
/// Grounded on the teacher's `content_saver::save_compressed_file` for the
/// write path's shape (compress off the async thread, atomic commit) but
/// keyed on SHA-256 identity rather than per-URL file paths.
pub struct Storage {
    pool: SqlitePool,
    storage_dir: PathBuf,
    inline_threshold_bytes: usize,
    bucket_max_entries: u64,
    bucket_max_bytes: u64,
    default_compression: CompressionKind,
    default_compression_level: i32,
}

impl Storage {
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        storage_dir: PathBuf,
        inline_threshold_bytes: usize,
        bucket_max_entries: u64,
        bucket_max_bytes: u64,
        default_compression: CompressionKind,
    ) -> Self {
        Self {
            pool,
            storage_dir,
            inline_threshold_bytes,
            bucket_max_entries,
            bucket_max_bytes,
            default_compression,
            default_compression_level: 3,
        }
    }

    /// Store `bytes`, returning a [`ContentRef`]. Idempotent on content hash:
    /// if the hash already exists, the existing ref is returned and `bytes`
    /// is discarded without a second write.
    pub async fn put(&self, bytes: Vec<u8>) -> Result<ContentRef, StorageError> {
        let sha256 = hex::encode(Sha256::digest(&bytes));

        if let Some(existing) = self.find_by_hash(&sha256).await? {
            return Ok(existing);
        }

        if bytes.len() < self.inline_threshold_bytes {
            self.put_inline(sha256, bytes).await
        } else {
            self.put_bucketed(sha256, bytes).await
        }
    }

    async fn find_by_hash(&self, sha256: &str) -> Result<Option<ContentRef>, StorageError> {
        let row = sqlx::query(
            "SELECT id, storage_type, uncompressed_size, compressed_size \
             FROM content_storage WHERE content_sha256 = ?1",
        )
        .bind(sha256)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ContentRef {
            content_id: r.get::<i64, _>("id"),
            content_sha256: sha256.to_string(),
            storage_type: match r.get::<String, _>("storage_type").as_str() {
                "inline" => StorageType::Inline,
                "bucketed" => StorageType::Bucketed,
                _ => StorageType::External,
            },
            uncompressed_size: r.get::<i64, _>("uncompressed_size") as u64,
            compressed_size: r
                .get::<Option<i64>, _>("compressed_size")
                .map(|v| v as u64),
        }))
    }

    async fn put_inline(
        &self,
        sha256: String,
        bytes: Vec<u8>,
    ) -> Result<ContentRef, StorageError> {
        let uncompressed_size = bytes.len() as u64;
        let now = now_unix();

        let result = sqlx::query(
            "INSERT INTO content_storage \
             (storage_type, content_blob, content_sha256, uncompressed_size, created_at) \
             VALUES ('inline', ?1, ?2, ?3, ?4) \
             ON CONFLICT(content_sha256) DO NOTHING",
        )
        .bind(&bytes)
        .bind(&sha256)
        .bind(uncompressed_size as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // lost the race to a concurrent writer; the winner's row stands
            return self
                .find_by_hash(&sha256)
                .await?
                .ok_or_else(|| StorageError::NotFound(sha256.clone()));
        }

        Ok(ContentRef {
            content_id: result.last_insert_rowid(),
            content_sha256: sha256,
            storage_type: StorageType::Inline,
            uncompressed_size,
            compressed_size: None,
        })
    }

    async fn put_bucketed(
        &self,
        sha256: String,
        bytes: Vec<u8>,
    ) -> Result<ContentRef, StorageError> {
        let uncompressed_size = bytes.len() as u64;
        let compression_type_id = self
            .ensure_compression_type(self.default_compression)
            .await?;

        let compressed = compression::compress(
            self.default_compression,
            bytes,
            self.default_compression_level,
        )
        .await?;
        let compressed_size = compressed.len() as u64;

        let (bucket_id, bucket_name) = self.find_or_create_active_bucket(compression_type_id).await?;
        let path = bucket::bucket_file_path(&self.storage_dir, bucket_id);
        let (offset, written) = bucket::append(path.clone(), compressed).await?;

        let mut tx = self.pool.begin().await?;

        let entry_insert = sqlx::query(
            "INSERT INTO bucket_entries \
             (bucket_id, entry_key, uncompressed_size, compressed_size, offset) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(bucket_id)
        .bind(&sha256)
        .bind(uncompressed_size as i64)
        .bind(compressed_size as i64)
        .bind(offset as i64)
        .execute(&mut *tx)
        .await;

        if let Err(err) = entry_insert {
            tx.rollback().await.ok();
            bucket::truncate_to(path, offset).await?;
            if is_unique_violation(&err) {
                return self
                    .find_by_hash(&sha256)
                    .await?
                    .ok_or_else(|| StorageError::NotFound(sha256.clone()));
            }
            return Err(StorageError::Database(err));
        }

        sqlx::query(
            "UPDATE compression_buckets \
             SET total_entries = total_entries + 1, \
                 total_uncompressed_bytes = total_uncompressed_bytes + ?1, \
                 total_compressed_bytes = total_compressed_bytes + ?2 \
             WHERE id = ?3",
        )
        .bind(uncompressed_size as i64)
        .bind(written as i64)
        .bind(bucket_id)
        .execute(&mut *tx)
        .await?;

        let content_insert = sqlx::query(
            "INSERT INTO content_storage \
             (storage_type, compression_type_id, compression_bucket_id, bucket_entry_key, \
              content_sha256, uncompressed_size, compressed_size, compression_ratio, created_at) \
             VALUES ('bucketed', ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(content_sha256) DO NOTHING",
        )
        .bind(compression_type_id)
        .bind(bucket_id)
        .bind(&sha256)
        .bind(&sha256)
        .bind(uncompressed_size as i64)
        .bind(written as i64)
        .bind(written as f64 / uncompressed_size.max(1) as f64)
        .bind(now_unix())
        .execute(&mut *tx)
        .await?;

        if content_insert.rows_affected() == 0 {
            tx.rollback().await.ok();
            bucket::truncate_to(path, offset).await?;
            return self
                .find_by_hash(&sha256)
                .await?
                .ok_or_else(|| StorageError::NotFound(sha256.clone()));
        }

        let row_id = content_insert.last_insert_rowid();
        tx.commit().await?;

        self.maybe_seal_bucket(bucket_id, &bucket_name).await?;

        Ok(ContentRef {
            content_id: row_id,
            content_sha256: sha256,
            storage_type: StorageType::Bucketed,
            uncompressed_size,
            compressed_size: Some(written),
        })
    }

    /// Fetch and decompress the bytes behind `content_ref`, verifying the
    /// SHA-256 of the decompressed payload matches.
    pub async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, StorageError> {
        match content_ref.storage_type {
            StorageType::Inline => {
                let row = sqlx::query("SELECT content_blob FROM content_storage WHERE id = ?1")
                    .bind(content_ref.content_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| StorageError::NotFound(content_ref.content_sha256.clone()))?;
                Ok(row.get::<Vec<u8>, _>("content_blob"))
            }
            StorageType::Bucketed => {
                let row = sqlx::query(
                    "SELECT be.bucket_id, be.offset, be.compressed_size, ct.algorithm \
                     FROM content_storage cs \
                     JOIN bucket_entries be \
                       ON be.bucket_id = cs.compression_bucket_id \
                      AND be.entry_key = cs.bucket_entry_key \
                     JOIN compression_types ct ON ct.id = cs.compression_type_id \
                     WHERE cs.id = ?1",
                )
                .bind(content_ref.content_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StorageError::NotFound(content_ref.content_sha256.clone()))?;

                let bucket_id: i64 = row.get("bucket_id");
                let offset: i64 = row.get("offset");
                let compressed_size: i64 = row.get("compressed_size");
                let algorithm: String = row.get("algorithm");
                let kind = CompressionKind::parse(&algorithm)?;

                let path = bucket::bucket_file_path(&self.storage_dir, bucket_id);
                let compressed = bucket::read_range(path, offset as u64, compressed_size as u64).await?;
                let bytes = compression::decompress(kind, compressed).await?;

                let actual = hex::encode(Sha256::digest(&bytes));
                if actual != content_ref.content_sha256 {
                    return Err(StorageError::ChecksumMismatch {
                        expected: content_ref.content_sha256.clone(),
                        actual,
                    });
                }
                Ok(bytes)
            }
            StorageType::External => Err(StorageError::NotFound(content_ref.content_sha256.clone())),
        }
    }

    /// Seal a bucket: subsequent `put`s of its compression type open/create
    /// a fresh active bucket.
    pub async fn seal(&self, bucket_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE compression_buckets SET status = 'sealed', sealed_at = ?1 \
             WHERE id = ?2 AND status = 'active'",
        )
        .bind(now_unix())
        .bind(bucket_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn maybe_seal_bucket(&self, bucket_id: i64, _name: &str) -> Result<(), StorageError> {
        let row = sqlx::query(
            "SELECT total_entries, total_compressed_bytes FROM compression_buckets WHERE id = ?1",
        )
        .bind(bucket_id)
        .fetch_one(&self.pool)
        .await?;

        let entries: i64 = row.get("total_entries");
        let bytes: i64 = row.get("total_compressed_bytes");

        if entries as u64 >= self.bucket_max_entries || bytes as u64 >= self.bucket_max_bytes {
            self.seal(bucket_id).await?;
        }
        Ok(())
    }

    async fn ensure_compression_type(&self, kind: CompressionKind) -> Result<i64, StorageError> {
        if let Some(row) = sqlx::query("SELECT id FROM compression_types WHERE name = ?1")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(row.get("id"));
        }

        let result = sqlx::query(
            "INSERT INTO compression_types (name, algorithm, level) VALUES (?1, ?1, ?2) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(self.default_compression_level)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let row = sqlx::query("SELECT id FROM compression_types WHERE name = ?1")
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?;
            return Ok(row.get("id"));
        }
        Ok(result.last_insert_rowid())
    }

    async fn find_or_create_active_bucket(
        &self,
        compression_type_id: i64,
    ) -> Result<(i64, String), StorageError> {
        if let Some(row) = sqlx::query(
            "SELECT id, name FROM compression_buckets \
             WHERE compression_type_id = ?1 AND status = 'active' \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(compression_type_id)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok((row.get("id"), row.get("name")));
        }

        let name = format!("bucket-{}-{}", compression_type_id, now_unix());
        let result = sqlx::query(
            "INSERT INTO compression_buckets (name, compression_type_id, status, created_at) \
             VALUES (?1, ?2, 'active', ?3)",
        )
        .bind(&name)
        .bind(compression_type_id)
        .bind(now_unix())
        .execute(&self.pool)
        .await?;

        Ok((result.last_insert_rowid(), name))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("crawl.db")).await.unwrap();
        let storage = Storage::new(
            pool,
            dir.path().join("content"),
            16,
            3,
            u64::MAX,
            CompressionKind::Zstd,
        );
        (storage, dir)
    }

    #[tokio::test]
    async fn put_small_payload_is_inline() {
        let (storage, _dir) = test_storage().await;
        let content_ref = storage.put(b"tiny".to_vec()).await.unwrap();
        assert_eq!(content_ref.storage_type, StorageType::Inline);

        let bytes = storage.get(&content_ref).await.unwrap();
        assert_eq!(bytes, b"tiny");
    }

    #[tokio::test]
    async fn put_large_payload_is_bucketed_and_round_trips() {
        let (storage, _dir) = test_storage().await;
        let payload = "x".repeat(64).into_bytes();
        let content_ref = storage.put(payload.clone()).await.unwrap();
        assert_eq!(content_ref.storage_type, StorageType::Bucketed);

        let bytes = storage.get(&content_ref).await.unwrap();
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn put_is_idempotent_on_hash() {
        let (storage, _dir) = test_storage().await;
        let a = storage.put(b"repeat me please".to_vec()).await.unwrap();
        let b = storage.put(b"repeat me please".to_vec()).await.unwrap();
        assert_eq!(a.content_id, b.content_id);
    }

    #[tokio::test]
    async fn bucket_seals_on_max_entries() {
        let (storage, _dir) = test_storage().await;
        let payloads = ["a".repeat(32), "b".repeat(32), "c".repeat(32), "d".repeat(32)];

        let mut first_bucket = None;
        for (i, p) in payloads.iter().enumerate() {
            let content_ref = storage.put(p.clone().into_bytes()).await.unwrap();
            let row = sqlx::query(
                "SELECT compression_bucket_id FROM content_storage WHERE id = ?1",
            )
            .bind(content_ref.content_id)
            .fetch_one(&storage.pool)
            .await
            .unwrap();
            let bucket_id: i64 = row.get("compression_bucket_id");
            if i == 0 {
                first_bucket = Some(bucket_id);
            }
            if i < 3 {
                assert_eq!(Some(bucket_id), first_bucket);
            } else {
                assert_ne!(Some(bucket_id), first_bucket);
            }
        }

        let sealed_status: String = sqlx::query("SELECT status FROM compression_buckets WHERE id = ?1")
            .bind(first_bucket.unwrap())
            .fetch_one(&storage.pool)
            .await
            .unwrap()
            .get("status");
        assert_eq!(sealed_status, "sealed");
    }
}
