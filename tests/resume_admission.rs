//! End-to-end resume admission scenario (spec.md §8 scenario 5): literal
//! queue set, `availableSlots=3`, no jobs already running -> `{1, 3}`
//! selected, `2` blocked on `domain-conflict` (shares a host with `1`).

use std::collections::HashSet;

use newsgraph_crawler::resume::{plan_resume, BlockedReason, QueueSource, ResumeInputs, ResumeOutcome};

fn source(id: &str, url: &str) -> QueueSource {
    QueueSource {
        id: Some(id.to_string()),
        url: Some(url.to_string()),
        args: None,
        started_at: None,
    }
}

#[test]
fn literal_resume_admission_scenario() {
    let inputs = ResumeInputs {
        queues: vec![
            source("1", "https://a.com"),
            source("2", "https://a.com/x"),
            source("3", "https://b.com"),
        ],
        available_slots: 3,
        running_job_ids: HashSet::new(),
        running_domains: HashSet::new(),
    };

    let plan = plan_resume(inputs);

    assert_eq!(plan.selected, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(
        plan.info["2"].outcome,
        ResumeOutcome::Blocked(BlockedReason::DomainConflict)
    );
}
