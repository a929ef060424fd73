//! Progress reporting abstraction, adapted from the teacher's
//! `crawl_engine::progress::ProgressReporter` — same no-op-inlining shape,
//! rebased on this crate's stage/milestone/problem vocabulary instead of
//! browser lifecycle events.

use super::stage::PlannerStage;

pub trait ProgressReporter: Send + Sync {
    fn report_stage_entered(&self, stage: PlannerStage);
    fn report_stage_completed(&self, stage: PlannerStage);
    fn report_milestone(&self, message: &str);
    fn report_problem(&self, message: &str);
}

#[derive(Debug, Clone, Copy)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report_stage_entered(&self, _stage: PlannerStage) {}

    #[inline(always)]
    fn report_stage_completed(&self, _stage: PlannerStage) {}

    #[inline(always)]
    fn report_milestone(&self, _message: &str) {}

    #[inline(always)]
    fn report_problem(&self, _message: &str) {}
}
