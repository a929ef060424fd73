//! Resume admission: a pure, deterministic function over in-memory inputs.
//!
//! No I/O lives here by design — [`crate::planner::JobRegistry`] gathers
//! `{queues, available_slots, running_job_ids, running_domains}` from the
//! database and live job map, then calls [`plan_resume`]. Shaped after the
//! teacher's `mcp::registry` job-record fields (`id`, `url`, `args`,
//! `started_at`) but with zero awaits anywhere in this module.

mod types;

pub use types::{BlockedReason, QueueSource, ResumeEntry, ResumeOutcome, ResumePlan};

use std::collections::{HashMap, HashSet};

/// Inputs to [`plan_resume`].
pub struct ResumeInputs {
    pub queues: Vec<QueueSource>,
    pub available_slots: usize,
    pub running_job_ids: HashSet<String>,
    pub running_domains: HashSet<String>,
}

/// Evaluate, in order, which paused jobs may resume now. See spec.md §4.7.
#[must_use]
pub fn plan_resume(inputs: ResumeInputs) -> ResumePlan {
    let mut selected_domains: HashSet<String> = HashSet::new();
    let mut selected = Vec::new();
    let mut blocked_domains: HashMap<String, BlockedReason> = HashMap::new();
    let mut info: HashMap<String, ResumeEntry> = HashMap::new();
    let mut processed = 0usize;

    for queue in inputs.queues {
        processed += 1;

        let Some(id) = queue.id.clone() else {
            continue;
        };

        if queue.url.is_none() && queue.args.is_none() {
            info.insert(
                id,
                ResumeEntry {
                    outcome: ResumeOutcome::Blocked(BlockedReason::MissingSource),
                    domain: None,
                },
            );
            continue;
        }

        let domain = resolve_domain(&queue);

        if inputs.running_job_ids.contains(&id) {
            info.insert(
                id,
                ResumeEntry {
                    outcome: ResumeOutcome::Blocked(BlockedReason::AlreadyRunning),
                    domain,
                },
            );
            continue;
        }

        if let Some(domain) = &domain {
            if selected_domains.contains(domain) || inputs.running_domains.contains(domain) {
                blocked_domains
                    .entry(domain.clone())
                    .or_insert(BlockedReason::DomainConflict);
                info.insert(
                    id,
                    ResumeEntry {
                        outcome: ResumeOutcome::Blocked(BlockedReason::DomainConflict),
                        domain: Some(domain.clone()),
                    },
                );
                continue;
            }
        }

        if selected.len() >= inputs.available_slots {
            info.insert(
                id.clone(),
                ResumeEntry {
                    outcome: ResumeOutcome::Queued,
                    domain: domain.clone(),
                },
            );
            continue;
        }

        if let Some(domain) = &domain {
            selected_domains.insert(domain.clone());
        }
        info.insert(
            id.clone(),
            ResumeEntry {
                outcome: ResumeOutcome::Selected,
                domain,
            },
        );
        selected.push(id);
    }

    let recommended_ids = selected.clone();

    ResumePlan {
        selected,
        processed,
        info,
        blocked_domains: blocked_domains.into_keys().collect(),
        recommended_ids,
    }
}

fn resolve_domain(queue: &QueueSource) -> Option<String> {
    let candidate = queue.url.as_deref().or(queue.args.as_deref())?;
    url::Url::parse(candidate)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, url: &str) -> QueueSource {
        QueueSource {
            id: Some(id.to_string()),
            url: Some(url.to_string()),
            args: None,
            started_at: None,
        }
    }

    #[test]
    fn missing_source_is_blocked() {
        let inputs = ResumeInputs {
            queues: vec![QueueSource {
                id: Some("job-1".to_string()),
                url: None,
                args: None,
                started_at: None,
            }],
            available_slots: 10,
            running_job_ids: HashSet::new(),
            running_domains: HashSet::new(),
        };
        let plan = plan_resume(inputs);
        assert_eq!(
            plan.info["job-1"].outcome,
            ResumeOutcome::Blocked(BlockedReason::MissingSource)
        );
    }

    #[test]
    fn domain_conflict_blocks_second_job_same_domain() {
        let inputs = ResumeInputs {
            queues: vec![
                source("job-1", "https://news.example.com/a"),
                source("job-2", "https://news.example.com/b"),
            ],
            available_slots: 10,
            running_job_ids: HashSet::new(),
            running_domains: HashSet::new(),
        };
        let plan = plan_resume(inputs);
        assert_eq!(plan.info["job-1"].outcome, ResumeOutcome::Selected);
        assert_eq!(
            plan.info["job-2"].outcome,
            ResumeOutcome::Blocked(BlockedReason::DomainConflict)
        );
        assert_eq!(plan.blocked_domains, vec!["news.example.com".to_string()]);
    }

    #[test]
    fn capacity_exceeded_queues_remainder() {
        let inputs = ResumeInputs {
            queues: vec![
                source("job-1", "https://a.example.com"),
                source("job-2", "https://b.example.com"),
            ],
            available_slots: 1,
            running_job_ids: HashSet::new(),
            running_domains: HashSet::new(),
        };
        let plan = plan_resume(inputs);
        assert_eq!(plan.selected, vec!["job-1".to_string()]);
        assert_eq!(plan.info["job-2"].outcome, ResumeOutcome::Queued);
    }

    #[test]
    fn already_running_job_is_blocked() {
        let mut running = HashSet::new();
        running.insert("job-1".to_string());
        let inputs = ResumeInputs {
            queues: vec![source("job-1", "https://example.com")],
            available_slots: 10,
            running_job_ids: running,
            running_domains: HashSet::new(),
        };
        let plan = plan_resume(inputs);
        assert_eq!(
            plan.info["job-1"].outcome,
            ResumeOutcome::Blocked(BlockedReason::AlreadyRunning)
        );
    }
}
