//! `runJob`'s event-driven execution loop, spec.md §4.4/§9.
//!
//! A single task per job drains the queue, fetches, stores and analyzes
//! pages, modeled as transitions over `{tick, fetchCompleted, userAction,
//! stageDone}` events rather than a plain `loop { dequeue(); fetch(); }` —
//! `userAction` is observed implicitly at the top of every transition via
//! the job's status and [`tokio_util::sync::CancellationToken`], so a
//! `pauseJob`/`cancelJob` call from another task takes effect at the next
//! event boundary instead of requiring the loop to poll for it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::analyzer::{AnalyzerError, ContentAnalyzer};
use crate::config::DEFAULT_BACKOFF_BASE_MS;
use crate::fetch::{FetchClient, FetchError, FetchOutcome};
use crate::queue::QueueItem;
use crate::storage::Storage;

use super::error::PlannerError;
use super::job::{CrawlJob, JobStatus};
use super::registry::JobRegistry;
use super::stage::{PlannerStage, StageStatus};

enum JobEvent {
    Tick,
    FetchCompleted {
        item: QueueItem,
        outcome: Result<FetchOutcome, FetchError>,
    },
    StageDone,
}

/// Drive `job` through `discovery → fetch-loop → extract → shutdown` until
/// its frontier is exhausted or a pause/cancel takes effect, in which case
/// this returns early and a later `run_job` call picks up where it left off.
pub async fn run_job(
    registry: &JobRegistry,
    job: &Arc<CrawlJob>,
    fetch: &FetchClient,
    storage: &Storage,
    analyzer: &ContentAnalyzer,
    retry_budget: u32,
) -> Result<(), PlannerError> {
    let mut events = VecDeque::new();
    events.push_back(JobEvent::Tick);

    if job.stage() == PlannerStage::Startup {
        registry
            .record_stage_event(job, PlannerStage::Discovery, StageStatus::Entered, None)
            .await?;
    }

    let mut entered_fetch_loop = job.stage() != PlannerStage::Startup && job.stage() != PlannerStage::Discovery;

    while let Some(event) = events.pop_front() {
        if job.cancellation.is_cancelled() || job.status() != JobStatus::Running {
            break;
        }

        match event {
            JobEvent::Tick => {
                let Some(item) = job.queue.dequeue().await.map_err(queue_err)? else {
                    events.push_back(JobEvent::StageDone);
                    continue;
                };

                if !entered_fetch_loop {
                    entered_fetch_loop = true;
                    registry
                        .record_stage_event(job, PlannerStage::FetchLoop, StageStatus::Entered, None)
                        .await?;
                }

                let outcome = fetch.fetch(&item.url, None, None).await;
                events.push_back(JobEvent::FetchCompleted { item, outcome });
            }

            JobEvent::FetchCompleted { item, outcome } => {
                handle_fetch_completed(registry, job, storage, analyzer, item, outcome, retry_budget)
                    .await?;
                events.push_back(JobEvent::Tick);
            }

            JobEvent::StageDone => {
                if entered_fetch_loop {
                    registry
                        .record_stage_event(job, PlannerStage::FetchLoop, StageStatus::Completed, None)
                        .await?;
                }
                registry
                    .record_stage_event(job, PlannerStage::Extract, StageStatus::Completed, None)
                    .await?;
                registry
                    .record_stage_event(job, PlannerStage::Shutdown, StageStatus::Entered, None)
                    .await?;
                registry.finish_job(&job.id).await?;
                registry
                    .record_stage_event(job, PlannerStage::Shutdown, StageStatus::Completed, None)
                    .await?;
            }
        }
    }

    Ok(())
}

async fn handle_fetch_completed(
    registry: &JobRegistry,
    job: &Arc<CrawlJob>,
    storage: &Storage,
    analyzer: &ContentAnalyzer,
    mut item: QueueItem,
    outcome: Result<FetchOutcome, FetchError>,
    retry_budget: u32,
) -> Result<(), PlannerError> {
    match outcome {
        Ok(result) if result.http_status < 400 => {
            job.queue.complete(item.url_id).map_err(queue_err)?;
            analyze_fetched_page(registry, job, storage, analyzer, &item, result).await
        }
        Ok(result) => {
            let reason = format!("HTTP {}", result.http_status);
            job.queue.fail_terminal(&item, &reason).await.map_err(queue_err)
        }
        Err(err) if err.is_retriable() => {
            let reason = err.to_string();
            if item.retry_count >= retry_budget {
                job.queue.fail_terminal(&item, &reason).await.map_err(queue_err)
            } else {
                item.not_before = Some(Utc::now() + retry_backoff(item.retry_count));
                job.queue.fail_retriable(item, &reason).await.map_err(queue_err)
            }
        }
        Err(err) => {
            let reason = err.to_string();
            job.queue.fail_terminal(&item, &reason).await.map_err(queue_err)
        }
    }
}

/// `min(2^n * DEFAULT_BACKOFF_BASE_MS, 60s)`, mirroring the host rate
/// limiter's 429 backoff so a persistently-failing retriable URL (DNS
/// failure, connect timeout) backs off instead of spinning the event loop.
fn retry_backoff(retry_count: u32) -> chrono::Duration {
    let exponent = retry_count.min(32);
    let backoff_ms = (DEFAULT_BACKOFF_BASE_MS as u128)
        .saturating_mul(1u128 << exponent)
        .min(60_000);
    chrono::Duration::from_std(Duration::from_millis(backoff_ms as u64))
        .unwrap_or_else(|_| chrono::Duration::seconds(60))
}

async fn analyze_fetched_page(
    registry: &JobRegistry,
    job: &Arc<CrawlJob>,
    storage: &Storage,
    analyzer: &ContentAnalyzer,
    item: &QueueItem,
    outcome: FetchOutcome,
) -> Result<(), PlannerError> {
    if outcome.not_modified() || outcome.body.is_empty() {
        return Ok(());
    }

    let content_ref = storage
        .put(outcome.body.clone())
        .await
        .map_err(|e| PlannerError::Database(sqlx::Error::Protocol(e.to_string())))?;

    match analyzer
        .analyze(content_ref.content_id, &outcome.body, outcome.content_type.as_deref())
        .await
    {
        Ok(_) | Err(AnalyzerError::EmptyDocument) => Ok(()),
        Err(err) => {
            registry
                .record_stage_event(
                    job,
                    PlannerStage::Extract,
                    StageStatus::Failed,
                    Some(format!("url_id={}: {err}", item.url_id)),
                )
                .await
        }
    }
}

fn queue_err(err: crate::queue::QueueError) -> PlannerError {
    PlannerError::Database(sqlx::Error::Protocol(err.to_string()))
}
