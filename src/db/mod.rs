//! Embedded relational state: a single SQLite file per deployment.
//!
//! Mirrors the pool-setup pattern of the teacher's `link_index::LinkIndex`
//! (`sqlx::sqlite::SqliteConnectOptions` + WAL + busy-timeout) but owns the
//! crate's full schema rather than a two-table link graph.

mod schema;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Opens (creating if absent) the crawl database and applies the schema.
///
/// Required PRAGMAs per spec: WAL, foreign keys on, 5s busy timeout,
/// `synchronous=NORMAL`.
pub async fn open(database_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = database_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    sqlx::query(schema::SCHEMA_SQL).execute(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("crawl.db");
        let pool = open(&db_path).await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM urls")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("crawl.db");
        open(&db_path).await.unwrap();
        // reopening must not fail on CREATE TABLE / CREATE INDEX
        open(&db_path).await.unwrap();
    }
}
