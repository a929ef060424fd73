//! URL/queue state machine: `new → queued → in-flight → {completed,
//! error-retriable, error-terminal}`, with a bounded in-memory frontier
//! window and disk spillover via `crawl_tasks`.
//!
//! Grounded on the teacher's `crawl_engine::crawl_types::CrawlQueue` (item
//! shape) and `crawl_engine::retry_queue::RetryQueue` (domain-keyed holding
//! area, drained on recovery) — generalized from circuit-state gating to
//! the full job-scoped state machine.

mod error;
mod state;
mod types;

pub use error::QueueError;
pub use state::JobQueue;
pub use types::{Origin, QueueAction, QueueEvent, QueueItem, Role, UrlState};
