use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::analyzer::ContentAnalyzer;
use crate::fetch::FetchClient;
use crate::queue::{JobQueue, Origin, QueueItem, Role};
use crate::resume::{plan_resume, QueueSource, ResumeInputs, ResumePlan};
use crate::storage::Storage;

use super::error::PlannerError;
use super::execution;
use super::job::{CrawlJob, JobStatus};
use super::stage::{PlannerStage, PlannerStageEvent, StageStatus};

/// A row read back from `queue_events` for `listQueueEvents` (spec.md §6).
/// Action/origin/role are kept as the raw stored tokens rather than parsed
/// back into `queue::types` enums — this is a read-only reporting view, not
/// a state-machine input.
#[derive(Debug, Clone)]
pub struct QueueEventRecord {
    pub ts: i64,
    pub action: String,
    pub url_id: Option<i64>,
    pub depth: Option<i64>,
    pub host: Option<String>,
    pub reason: Option<String>,
    pub queue_size: Option<i64>,
}

/// Registry of live jobs, exposing the control-plane surface named in
/// spec.md §6 (`startJob`, `pauseJob`, `resumeJob`, `cancelJob`,
/// `listJobs`, `getJob`, `listQueueEvents`, `getResumeInventory`,
/// `resumeAll`, `clearQueues`).
///
/// Grounded on the teacher's `mcp::registry::CrawlRegistry`
/// (`Arc<Mutex<HashMap<...>>>` find-or-create pattern), generalized from a
/// `(connection_id, crawl_id)` key to a single `job_id` namespace backed by
/// the `crawl_jobs` table. `run_job` (spec.md §4.4/§9) is grounded on the
/// teacher's `crawl_engine::{orchestrator, execution}` stage-sequencing
/// shape and lives in [`super::execution`].
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<tokio::sync::Mutex<HashMap<String, Arc<CrawlJob>>>>,
    pool: SqlitePool,
    queue_window_size: usize,
    fetch: Arc<FetchClient>,
    storage: Arc<Storage>,
    analyzer: Arc<ContentAnalyzer>,
    retry_budget: u32,
}

impl JobRegistry {
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        queue_window_size: usize,
        fetch: Arc<FetchClient>,
        storage: Arc<Storage>,
        analyzer: Arc<ContentAnalyzer>,
        retry_budget: u32,
    ) -> Self {
        Self {
            jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            pool,
            queue_window_size,
            fetch,
            storage,
            analyzer,
            retry_budget,
        }
    }

    pub async fn start_job(&self, seed_url: String) -> Result<Arc<CrawlJob>, PlannerError> {
        let job_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let url_id = self.ensure_url(&seed_url).await?;

        sqlx::query(
            "INSERT INTO crawl_jobs (id, url_id, started_at, status) VALUES (?1, ?2, ?3, 'running')",
        )
        .bind(&job_id)
        .bind(url_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let queue = Arc::new(JobQueue::new(job_id.clone(), self.pool.clone(), self.queue_window_size));
        let host = url::Url::parse(&seed_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        queue
            .enqueue(QueueItem {
                url_id,
                url: seed_url.clone(),
                host,
                depth: 0,
                origin: Origin::Seed,
                role: Role::Frontier,
                retry_count: 0,
                not_before: None,
            })
            .await
            .map_err(|e| PlannerError::Database(sqlx::Error::Protocol(e.to_string())))?;

        let job = Arc::new(CrawlJob::new(job_id.clone(), seed_url, queue));

        self.jobs.lock().await.insert(job_id, job.clone());
        self.record_stage_event(&job, PlannerStage::Startup, StageStatus::Entered, None)
            .await?;
        Ok(job)
    }

    /// Run `job_id` through its remaining stages: `discovery → fetch-loop →
    /// extract → shutdown`. Returns once the frontier is exhausted or a
    /// pause/cancel takes effect; call again to resume where it left off.
    pub async fn run_job(&self, job_id: &str) -> Result<(), PlannerError> {
        let job = self.require_job(job_id).await?;
        execution::run_job(
            self,
            &job,
            &self.fetch,
            &self.storage,
            &self.analyzer,
            self.retry_budget,
        )
        .await
    }

    /// Mark `job_id` `done` with `ended_at` set, both in-memory and in
    /// `crawl_jobs`. Called by [`super::execution::run_job`] once the
    /// frontier is exhausted, i.e. the `shutdown` stage is entered.
    pub(super) async fn finish_job(&self, job_id: &str) -> Result<(), PlannerError> {
        if let Some(job) = self.jobs.lock().await.get(job_id) {
            job.finish();
        }
        sqlx::query("UPDATE crawl_jobs SET status = 'done', ended_at = ?1 WHERE id = ?2")
            .bind(chrono::Utc::now().timestamp())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn pause_job(&self, job_id: &str) -> Result<(), PlannerError> {
        let job = self.require_job(job_id).await?;
        job.pause();
        sqlx::query("UPDATE crawl_jobs SET status = 'paused' WHERE id = ?1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resume a paused (or crash-paused) job: rebuilds its frontier from
    /// `queue_events`/`crawl_tasks` and marks it running again.
    pub async fn resume_job(&self, job_id: &str) -> Result<Arc<CrawlJob>, PlannerError> {
        if let Some(job) = self.jobs.lock().await.get(job_id).cloned() {
            job.set_status(JobStatus::Running);
            job.queue.rebuild_from_persisted().await.map_err(|_| {
                PlannerError::InvalidTransition {
                    job_id: job_id.to_string(),
                    status: "unknown".to_string(),
                    action: "resume".to_string(),
                }
            })?;
            sqlx::query("UPDATE crawl_jobs SET status = 'running' WHERE id = ?1")
                .bind(job_id)
                .execute(&self.pool)
                .await?;
            return Ok(job);
        }

        let row = sqlx::query(
            "SELECT cj.id, u.url FROM crawl_jobs cj JOIN urls u ON u.id = cj.url_id \
             WHERE cj.id = ?1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PlannerError::JobNotFound(job_id.to_string()))?;

        let seed_url: String = row.get("url");
        let queue = Arc::new(JobQueue::new(job_id.to_string(), self.pool.clone(), self.queue_window_size));
        queue
            .rebuild_from_persisted()
            .await
            .map_err(|e| PlannerError::Database(sqlx::Error::Protocol(e.to_string())))?;

        let job = Arc::new(CrawlJob::new(job_id.to_string(), seed_url, queue));
        job.set_status(JobStatus::Running);
        self.jobs.lock().await.insert(job_id.to_string(), job.clone());

        sqlx::query("UPDATE crawl_jobs SET status = 'running' WHERE id = ?1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<(), PlannerError> {
        let job = self.require_job(job_id).await?;
        job.cancel();
        sqlx::query("UPDATE crawl_jobs SET status = 'aborted', ended_at = ?1 WHERE id = ?2")
            .bind(chrono::Utc::now().timestamp())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_jobs(&self) -> Vec<(String, JobStatus)> {
        self.jobs
            .lock()
            .await
            .values()
            .map(|job| (job.id.clone(), job.status()))
            .collect()
    }

    pub async fn get_job(&self, job_id: &str) -> Option<Arc<CrawlJob>> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    /// Every job whose `ended_at IS NULL` is paused-on-restart per spec.md
    /// §4.2.
    pub async fn list_paused_on_restart(&self) -> Result<Vec<String>, PlannerError> {
        let rows = sqlx::query("SELECT id FROM crawl_jobs WHERE ended_at IS NULL AND status != 'aborted'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// The most recent `queue_events` rows for `job_id`, newest first.
    pub async fn list_queue_events(
        &self,
        job_id: &str,
        limit: usize,
    ) -> Result<Vec<QueueEventRecord>, PlannerError> {
        let rows = sqlx::query(
            "SELECT ts, action, url_id, depth, host, reason, queue_size FROM queue_events \
             WHERE job_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(job_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| QueueEventRecord {
                ts: row.get("ts"),
                action: row.get("action"),
                url_id: row.get("url_id"),
                depth: row.get("depth"),
                host: row.get("host"),
                reason: row.get("reason"),
                queue_size: row.get("queue_size"),
            })
            .collect())
    }

    /// Evaluate, but do not act on, which paused jobs may resume now (spec.md
    /// §4.7). `available_slots` is the caller's `maxConcurrent`.
    pub async fn get_resume_inventory(&self, available_slots: usize) -> Result<ResumePlan, PlannerError> {
        let rows = sqlx::query(
            "SELECT cj.id, u.url, cj.args, cj.started_at FROM crawl_jobs cj \
             LEFT JOIN urls u ON u.id = cj.url_id \
             WHERE cj.status = 'paused'",
        )
        .fetch_all(&self.pool)
        .await?;

        let queues = rows
            .into_iter()
            .map(|row| {
                let started_at: Option<i64> = row.get("started_at");
                QueueSource {
                    id: Some(row.get::<String, _>("id")),
                    url: row.get::<Option<String>, _>("url"),
                    args: row.get::<Option<String>, _>("args"),
                    started_at: started_at.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
                }
            })
            .collect();

        let jobs = self.jobs.lock().await;
        let running: Vec<_> = jobs
            .values()
            .filter(|j| j.status() == JobStatus::Running)
            .collect();
        let running_job_ids: HashSet<String> = running.iter().map(|j| j.id.clone()).collect();
        let running_domains: HashSet<String> = running
            .iter()
            .filter_map(|j| {
                url::Url::parse(&j.seed_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
            })
            .collect();
        drop(jobs);

        Ok(plan_resume(ResumeInputs {
            queues,
            available_slots,
            running_job_ids,
            running_domains,
        }))
    }

    /// Compute the resume plan and actually resume every job it selects,
    /// optionally restricted to `queue_ids` (spec.md §6 `resumeAll`).
    pub async fn resume_all(
        &self,
        queue_ids: Option<Vec<String>>,
        max_concurrent: Option<usize>,
    ) -> Result<ResumePlan, PlannerError> {
        let available_slots = max_concurrent.unwrap_or(usize::MAX);
        let mut plan = self.get_resume_inventory(available_slots).await?;

        if let Some(ids) = &queue_ids {
            let allow: HashSet<&str> = ids.iter().map(String::as_str).collect();
            plan.selected.retain(|id| allow.contains(id.as_str()));
        }

        for job_id in &plan.selected {
            self.resume_job(job_id).await?;
        }

        Ok(plan)
    }

    /// Drop every pending `crawl_tasks`/`queue_events` row (spec.md §6
    /// `clearQueues`). Live in-memory frontiers are untouched; this is for
    /// clearing persisted backlog between runs.
    pub async fn clear_queues(&self) -> Result<(), PlannerError> {
        sqlx::query("DELETE FROM crawl_tasks").execute(&self.pool).await?;
        sqlx::query("DELETE FROM queue_events").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn record_stage_event(
        &self,
        job: &CrawlJob,
        stage: PlannerStage,
        status: StageStatus,
        details: Option<String>,
    ) -> Result<(), PlannerError> {
        job.set_stage(stage);
        let event = PlannerStageEvent {
            job_id: job.id.clone(),
            ts: chrono::Utc::now(),
            stage,
            status,
            sequence: job.next_stage_sequence(),
            duration_ms: None,
            details,
        };
        sqlx::query(
            "INSERT INTO planner_stage_events (job_id, ts, stage, status, sequence, duration_ms, details) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&event.job_id)
        .bind(event.ts.timestamp())
        .bind(event.stage.as_str())
        .bind(event.status.as_str())
        .bind(event.sequence)
        .bind(event.duration_ms.map(|d| d as i64))
        .bind(&event.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn require_job(&self, job_id: &str) -> Result<Arc<CrawlJob>, PlannerError> {
        self.jobs
            .lock()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| PlannerError::JobNotFound(job_id.to_string()))
    }

    async fn ensure_url(&self, url: &str) -> Result<i64, PlannerError> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO urls (url, host, created_at, last_seen_at) VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(url) DO UPDATE SET last_seen_at = excluded.last_seen_at",
        )
        .bind(url)
        .bind(&host)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 && result.last_insert_rowid() > 0 {
            return Ok(result.last_insert_rowid());
        }

        let row = sqlx::query("SELECT id FROM urls WHERE url = ?1")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::fetch::CircuitBreaker;
    use crate::storage::CompressionKind;
    use std::time::Duration;

    async fn test_registry() -> (JobRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("crawl.db")).await.unwrap();

        let fetch = Arc::new(
            FetchClient::new(
                "test-agent/1.0".to_string(),
                Duration::from_secs(1),
                Duration::from_secs(1),
                3,
                2,
                5.0,
                Arc::new(CircuitBreaker::new(5, 2, Duration::from_secs(60))),
                Duration::from_secs(3600),
                Duration::from_millis(100),
            )
            .unwrap(),
        );
        let storage = Arc::new(Storage::new(
            pool.clone(),
            dir.path().join("content"),
            4_096,
            10_000,
            u64::MAX,
            CompressionKind::Zstd,
        ));
        let analyzer = Arc::new(ContentAnalyzer::new(pool.clone(), 10));

        (JobRegistry::new(pool, 100, fetch, storage, analyzer, 3), dir)
    }

    #[tokio::test]
    async fn start_pause_resume_cycle() {
        let (registry, _dir) = test_registry().await;
        let job = registry.start_job("https://example.com".to_string()).await.unwrap();
        assert_eq!(job.status(), JobStatus::Running);

        registry.pause_job(&job.id).await.unwrap();
        assert_eq!(registry.get_job(&job.id).await.unwrap().status(), JobStatus::Paused);

        let resumed = registry.resume_job(&job.id).await.unwrap();
        assert_eq!(resumed.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn cancel_sets_ended_at() {
        let (registry, _dir) = test_registry().await;
        let job = registry.start_job("https://example.com".to_string()).await.unwrap();
        registry.cancel_job(&job.id).await.unwrap();
        assert_eq!(registry.get_job(&job.id).await.unwrap().status(), JobStatus::Aborted);
    }

    #[tokio::test]
    async fn paused_on_restart_lists_unended_jobs() {
        let (registry, _dir) = test_registry().await;
        let job = registry.start_job("https://example.com".to_string()).await.unwrap();
        let paused = registry.list_paused_on_restart().await.unwrap();
        assert!(paused.contains(&job.id));
    }

    #[tokio::test]
    async fn run_job_drains_an_unreachable_seed_to_shutdown() {
        let (registry, _dir) = test_registry().await;
        // does-not-resolve.invalid never resolves, so the fetch fails with
        // a retriable network error; run_job backs it off with a future
        // not_before rather than retrying immediately, which leaves nothing
        // ready in the frontier and drives the job through to shutdown in
        // this single run_job call instead of spinning on the same URL.
        let job = registry
            .start_job("https://does-not-resolve.invalid".to_string())
            .await
            .unwrap();
        registry.run_job(&job.id).await.unwrap();
        assert_eq!(job.stage(), PlannerStage::Shutdown);
        assert_eq!(job.status(), JobStatus::Done);
    }

    #[tokio::test]
    async fn resume_all_selects_paused_jobs_up_to_capacity() {
        let (registry, _dir) = test_registry().await;
        let job_a = registry.start_job("https://a.example.com".to_string()).await.unwrap();
        let job_b = registry.start_job("https://b.example.com".to_string()).await.unwrap();
        registry.pause_job(&job_a.id).await.unwrap();
        registry.pause_job(&job_b.id).await.unwrap();

        let plan = registry.resume_all(None, Some(1)).await.unwrap();
        assert_eq!(plan.selected.len(), 1);
        assert_eq!(
            registry.get_job(&plan.selected[0]).await.unwrap().status(),
            JobStatus::Running
        );
    }

    #[tokio::test]
    async fn list_queue_events_returns_seed_enqueue() {
        let (registry, _dir) = test_registry().await;
        let job = registry.start_job("https://example.com".to_string()).await.unwrap();
        let events = registry.list_queue_events(&job.id, 10).await.unwrap();
        assert!(events.iter().any(|e| e.action == "enqueued"));
    }

    #[tokio::test]
    async fn clear_queues_empties_crawl_tasks() {
        let (registry, _dir) = test_registry().await;
        registry.start_job("https://example.com".to_string()).await.unwrap();
        registry.clear_queues().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_tasks")
            .fetch_one(&registry.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
