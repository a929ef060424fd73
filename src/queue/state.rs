use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use dashmap::DashMap;
use sqlx::{Row, SqlitePool};

use super::error::QueueError;
use super::types::{Origin, QueueAction, QueueEvent, QueueItem, Role, UrlState};

/// A single job's queue: a bounded in-memory frontier backed by the
/// `crawl_tasks` table for spillover and resume.
///
/// Mirrors the shape of the teacher's `RetryQueue` (domain-keyed holding
/// area drained on recovery) but generalized to the full URL lifecycle
/// rather than only circuit-open holding.
pub struct JobQueue {
    job_id: String,
    pool: SqlitePool,
    window_size: usize,
    frontier: parking_lot::Mutex<VecDeque<QueueItem>>,
    states: DashMap<i64, UrlState>,
}

impl JobQueue {
    #[must_use]
    pub fn new(job_id: String, pool: SqlitePool, window_size: usize) -> Self {
        Self {
            job_id,
            pool,
            window_size,
            frontier: parking_lot::Mutex::new(VecDeque::new()),
            states: DashMap::new(),
        }
    }

    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Enqueue a URL. No-op (returns `false`) if the URL already has a
    /// dedup-blocking state (`queued`, `in-flight`, or `completed`) for this
    /// job.
    pub async fn enqueue(&self, item: QueueItem) -> Result<bool, QueueError> {
        if let Some(state) = self.states.get(&item.url_id) {
            if state.is_dedup_blocking() {
                return Ok(false);
            }
        }

        self.states.insert(item.url_id, UrlState::Queued);

        let in_window = {
            let mut frontier = self.frontier.lock();
            if frontier.len() < self.window_size {
                frontier.push_back(item.clone());
                true
            } else {
                false
            }
        };

        if !in_window {
            self.spill_to_disk(&item).await?;
        }

        self.log_event(QueueAction::Enqueued, Some(&item), None).await?;
        Ok(true)
    }

    /// Hand the next ready item to a fetch worker, transitioning it to
    /// `in-flight`. Items with `not_before` in the future are skipped (left
    /// in the frontier) until ready.
    pub async fn dequeue(&self) -> Result<Option<QueueItem>, QueueError> {
        let take_ready = || {
            let mut frontier = self.frontier.lock();
            let now = Utc::now();
            let pos = frontier
                .iter()
                .position(|item| item.not_before.is_none_or(|nb| nb <= now));
            pos.and_then(|idx| frontier.remove(idx))
        };

        let item = match take_ready() {
            Some(item) => item,
            None => {
                let refilled = self.refill_from_disk().await?;
                if !refilled {
                    return Ok(None);
                }
                match take_ready() {
                    Some(item) => item,
                    None => return Ok(None),
                }
            }
        };

        self.states.insert(item.url_id, UrlState::InFlight);
        self.log_event(QueueAction::Dequeued, Some(&item), None).await?;
        Ok(Some(item))
    }

    /// `in-flight → completed`.
    pub fn complete(&self, url_id: i64) -> Result<(), QueueError> {
        self.transition_from_in_flight(url_id, UrlState::Completed)
    }

    /// `in-flight → error-retriable`, re-enqueuing with `not_before` set per
    /// the caller's backoff computation.
    pub async fn fail_retriable(
        &self,
        mut item: QueueItem,
        reason: &str,
    ) -> Result<(), QueueError> {
        self.transition_from_in_flight(item.url_id, UrlState::ErrorRetriable)?;
        item.retry_count += 1;
        item.role = Role::Retry;
        self.states.insert(item.url_id, UrlState::Queued);
        self.frontier.lock().push_back(item.clone());
        self.log_event(QueueAction::Error, Some(&item), Some(reason)).await?;
        Ok(())
    }

    /// `in-flight → error-terminal`.
    pub async fn fail_terminal(&self, item: &QueueItem, reason: &str) -> Result<(), QueueError> {
        self.transition_from_in_flight(item.url_id, UrlState::ErrorTerminal)?;
        self.log_event(QueueAction::Skipped, Some(item), Some(reason)).await?;
        Ok(())
    }

    #[must_use]
    pub fn state_of(&self, url_id: i64) -> Option<UrlState> {
        self.states.get(&url_id).map(|s| *s)
    }

    #[must_use]
    pub fn frontier_len(&self) -> usize {
        self.frontier.lock().len()
    }

    fn transition_from_in_flight(&self, url_id: i64, to: UrlState) -> Result<(), QueueError> {
        match self.states.get(&url_id).map(|s| *s) {
            Some(UrlState::InFlight) => {
                self.states.insert(url_id, to);
                Ok(())
            }
            Some(_) => Err(QueueError::NotInFlight(url_id)),
            None => Err(QueueError::UnknownUrl(url_id)),
        }
    }

    async fn spill_to_disk(&self, item: &QueueItem) -> Result<(), QueueError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO crawl_tasks (job_id, host, kind, status, url, payload, created_at, updated_at) \
             VALUES (?1, ?2, 'fetch', 'queued', ?3, ?4, ?5, ?5)",
        )
        .bind(&self.job_id)
        .bind(&item.host)
        .bind(&item.url)
        .bind(serde_json::json!({
            "url_id": item.url_id,
            "depth": item.depth,
            "origin": item.origin.as_str(),
            "role": item.role.as_str(),
            "retry_count": item.retry_count,
        }).to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Pull spilled tasks back into the in-memory frontier as space frees
    /// up. Returns whether any task was actually refilled.
    async fn refill_from_disk(&self) -> Result<bool, QueueError> {
        let available = self.window_size.saturating_sub(self.frontier_len());
        if available == 0 {
            return Ok(false);
        }

        let rows = sqlx::query(
            "SELECT id, host, url, payload FROM crawl_tasks \
             WHERE job_id = ?1 AND status = 'queued' ORDER BY id LIMIT ?2",
        )
        .bind(&self.job_id)
        .bind(available as i64)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(false);
        }

        let mut frontier = self.frontier.lock();
        for row in &rows {
            let task_id: i64 = row.get("id");
            let url: String = row.get("url");
            let host: String = row.get("host");
            let payload: String = row.get("payload");
            let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap_or_default();

            frontier.push_back(QueueItem {
                url_id: parsed.get("url_id").and_then(|v| v.as_i64()).unwrap_or(task_id),
                url,
                host,
                depth: parsed.get("depth").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                origin: Origin::Link,
                role: Role::Retry,
                retry_count: parsed.get("retry_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                not_before: None,
            });
        }
        drop(frontier);

        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!("DELETE FROM crawl_tasks WHERE id IN ({placeholders})");
        let mut q = sqlx::query(&query);
        for id in &ids {
            q = q.bind(id);
        }
        q.execute(&self.pool).await?;

        Ok(true)
    }

    async fn log_event(
        &self,
        action: QueueAction,
        item: Option<&QueueItem>,
        reason: Option<&str>,
    ) -> Result<(), QueueError> {
        let event = QueueEvent {
            job_id: self.job_id.clone(),
            ts: Utc::now(),
            action,
            url_id: item.map(|i| i.url_id),
            depth: item.map(|i| i.depth),
            host: item.map(|i| i.host.clone()),
            reason: reason.map(str::to_string),
            queue_size: self.frontier_len(),
            origin: item.map(|i| i.origin),
            role: item.map(|i| i.role),
            depth_bucket: item.map(|i| depth_bucket(i.depth)),
        };
        persist_event(&self.pool, &event).await
    }

    /// Rebuild this job's frontier from the persistent `queue_events` log
    /// and `crawl_tasks` table after a restart. The effective in-flight set
    /// at shutdown is re-queued with `role=retry`.
    pub async fn rebuild_from_persisted(&self) -> Result<(), QueueError> {
        let mut last_action: HashMap<i64, (QueueAction, Option<u32>, Option<String>)> =
            HashMap::new();

        let rows = sqlx::query(
            "SELECT url_id, depth, host, action FROM queue_events \
             WHERE job_id = ?1 AND url_id IS NOT NULL ORDER BY id ASC",
        )
        .bind(&self.job_id)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let url_id: i64 = row.get("url_id");
            let depth: Option<i64> = row.get("depth");
            let host: Option<String> = row.get("host");
            let action: String = row.get("action");
            let action = match action.as_str() {
                "enqueued" => QueueAction::Enqueued,
                "dequeued" => QueueAction::Dequeued,
                "skipped" => QueueAction::Skipped,
                "error" => QueueAction::Error,
                _ => QueueAction::Milestone,
            };
            last_action.insert(url_id, (action, depth.map(|d| d as u32), host));
        }

        for (url_id, (action, depth, host)) in last_action {
            if matches!(action, QueueAction::Dequeued) {
                self.states.insert(url_id, UrlState::Queued);
                self.frontier.lock().push_back(QueueItem {
                    url_id,
                    url: String::new(),
                    host: host.unwrap_or_default(),
                    depth: depth.unwrap_or(0),
                    origin: Origin::Link,
                    role: Role::Retry,
                    retry_count: 0,
                    not_before: None,
                });
            }
        }

        self.refill_from_disk().await?;
        Ok(())
    }
}

fn depth_bucket(depth: u32) -> String {
    match depth {
        0 => "root".to_string(),
        1..=2 => "shallow".to_string(),
        3..=5 => "mid".to_string(),
        _ => "deep".to_string(),
    }
}

async fn persist_event(pool: &SqlitePool, event: &QueueEvent) -> Result<(), QueueError> {
    sqlx::query(
        "INSERT INTO queue_events \
         (job_id, ts, action, url_id, depth, host, reason, queue_size, origin, role, depth_bucket) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&event.job_id)
    .bind(event.ts.timestamp())
    .bind(event.action.as_str())
    .bind(event.url_id)
    .bind(event.depth)
    .bind(&event.host)
    .bind(&event.reason)
    .bind(event.queue_size as i64)
    .bind(event.origin.map(Origin::as_str))
    .bind(event.role.map(Role::as_str))
    .bind(&event.depth_bucket)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_queue() -> (JobQueue, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("crawl.db")).await.unwrap();
        sqlx::query("INSERT INTO crawl_jobs (id, status) VALUES ('job-1', 'running')")
            .execute(&pool)
            .await
            .unwrap();
        for url_id in 1..=3 {
            sqlx::query(
                "INSERT INTO urls (url, host, created_at, last_seen_at) VALUES (?1, 'example.com', 0, 0)",
            )
            .bind(format!("https://example.com/{url_id}"))
            .execute(&pool)
            .await
            .unwrap();
        }
        (JobQueue::new("job-1".to_string(), pool, 2), dir)
    }

    fn item(url_id: i64) -> QueueItem {
        QueueItem {
            url_id,
            url: format!("https://example.com/{url_id}"),
            host: "example.com".to_string(),
            depth: 0,
            origin: Origin::Seed,
            role: Role::Frontier,
            retry_count: 0,
            not_before: None,
        }
    }

    #[tokio::test]
    async fn enqueue_dedups_queued_urls() {
        let (queue, _dir) = test_queue().await;
        assert!(queue.enqueue(item(1)).await.unwrap());
        assert!(!queue.enqueue(item(1)).await.unwrap());
    }

    #[tokio::test]
    async fn dequeue_transitions_to_in_flight_then_complete() {
        let (queue, _dir) = test_queue().await;
        queue.enqueue(item(1)).await.unwrap();
        let dequeued = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(dequeued.url_id, 1);
        assert_eq!(queue.state_of(1), Some(UrlState::InFlight));

        queue.complete(1).unwrap();
        assert_eq!(queue.state_of(1), Some(UrlState::Completed));
    }

    #[tokio::test]
    async fn beyond_window_spills_to_disk_and_refills() {
        let (queue, _dir) = test_queue().await;
        queue.enqueue(item(1)).await.unwrap();
        queue.enqueue(item(2)).await.unwrap();
        queue.enqueue(item(3)).await.unwrap(); // window_size=2, spills

        assert_eq!(queue.frontier_len(), 2);

        queue.dequeue().await.unwrap();
        queue.dequeue().await.unwrap();
        // frontier now empty; dequeue() triggers a refill from disk
        let refilled = queue.dequeue().await.unwrap();
        assert!(refilled.is_some());
    }

    #[tokio::test]
    async fn fail_retriable_reenqueues_with_incremented_retry_count() {
        let (queue, _dir) = test_queue().await;
        queue.enqueue(item(1)).await.unwrap();
        let dequeued = queue.dequeue().await.unwrap().unwrap();
        queue.fail_retriable(dequeued, "503").await.unwrap();
        assert_eq!(queue.state_of(1), Some(UrlState::Queued));
        assert_eq!(queue.frontier_len(), 1);
    }
}
