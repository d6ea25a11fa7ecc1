//! Drift-triggered plan adaptation.
//!
//! A plan moves between two states: `Stable` and `PreviewPending`. The drift
//! detector builds a preview (a stored, unapplied set of session changes);
//! the runner then confirms it, which applies the changes and appends a
//! ledger entry, or declines it, which discards it. The job-driven
//! [`PlanAdaptationService::recalculate`] path applies immediately.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AdaptationPolicy;
use crate::models::{
    count_changed, PendingPreview, PlanAdaptationHistory, RecalculationRequest, SessionChange, TrainingPlan,
    TrainingSession, TRAINING_DEVIATION_REASON,
};
use crate::services::clock::Clock;
use crate::services::cycle_phase_service::CyclePhaseOracle;
use crate::services::drift_detection::{assess_drift, early_plan_exempt, in_cooldown, qualifying_sessions};
use crate::services::plan_generator::AiPlanGenerator;
use crate::services::recalculation_context::{build_request, PlanContext, RequestWindow};
use crate::services::session_apply::SessionArena;
use crate::services::background_job_service::{JobQueue, JobType};
use crate::store::{PlanCommit, PlanStore, StoreError};

pub const DEFAULT_SUMMARY: &str =
    "Your upcoming sessions have been adjusted to match how your recent training has gone.";

/// Outcome of asking the planner for prose. A failure is a usable,
/// degraded result rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSummary {
    Generated(String),
    Fallback,
}

impl PlanSummary {
    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanSummary::Fallback)
    }

    pub fn into_text(self) -> String {
        match self {
            PlanSummary::Generated(text) => text,
            PlanSummary::Fallback => DEFAULT_SUMMARY.to_string(),
        }
    }
}

/// Planner output for the upcoming window, diffed against current sessions
struct WindowProposal {
    request: RecalculationRequest,
    sessions: Vec<TrainingSession>,
    changes: Vec<SessionChange>,
}

#[derive(Clone)]
pub struct PlanAdaptationService {
    store: Arc<dyn PlanStore>,
    generator: Arc<dyn AiPlanGenerator>,
    oracle: Arc<dyn CyclePhaseOracle>,
    jobs: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    policy: AdaptationPolicy,
}

impl PlanAdaptationService {
    pub fn new(
        store: Arc<dyn PlanStore>,
        generator: Arc<dyn AiPlanGenerator>,
        oracle: Arc<dyn CyclePhaseOracle>,
        jobs: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
        policy: AdaptationPolicy,
    ) -> Self {
        Self {
            store,
            generator,
            oracle,
            jobs,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &AdaptationPolicy {
        &self.policy
    }

    // Drift detection

    /// Inspect recent outcomes and build a preview when the plan has drifted.
    /// Returns true only when a preview was stored.
    pub async fn check_and_trigger(&self, plan_id: Uuid) -> bool {
        let plan = match self.store.get_plan(plan_id).await {
            Ok(Some(plan)) if plan.is_active() => plan,
            Ok(_) => {
                debug!(%plan_id, "Plan missing or not active, skipping drift check");
                return false;
            }
            Err(e) => {
                warn!(%plan_id, "Failed to load plan for drift check: {}", e);
                return false;
            }
        };

        let sessions = match self.store.list_sessions(plan_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(%plan_id, "Failed to load sessions for drift check: {}", e);
                return false;
            }
        };

        let assessment = assess_drift(&sessions, &self.policy);
        debug!(
            %plan_id,
            qualifying = assessment.qualifying_sessions,
            off_track = assessment.off_track_sessions,
            ratio = assessment.off_track_ratio,
            verdict = ?assessment.verdict,
            "Drift assessed"
        );
        if !assessment.is_drifted() {
            return false;
        }

        let now = self.clock.now();
        if in_cooldown(&plan, &self.policy, now) {
            info!(%plan_id, "Plan drifted but is inside the recalculation cool-down");
            return false;
        }
        if early_plan_exempt(&plan, &self.policy, now.date_naive()) {
            info!(%plan_id, "Plan drifted but is still inside the early-plan exemption");
            return false;
        }
        if plan.pending_confirmation {
            info!(%plan_id, "Plan drifted but a preview is already awaiting confirmation");
            return false;
        }
        if self.recalculation_in_flight(&plan).await {
            info!(%plan_id, "Plan drifted but a recalculation job is already in flight");
            return false;
        }

        match self.build_preview(&plan).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(%plan_id, "Preview generation failed: {:#}", e);
                false
            }
        }
    }

    async fn recalculation_in_flight(&self, plan: &TrainingPlan) -> bool {
        match plan.last_recalculation_job_id {
            Some(job_id) => self.jobs.get_state(job_id).await.is_in_flight(),
            None => false,
        }
    }

    // Preview building

    /// Ask the planner for a revision of the upcoming window and store it as
    /// a pending preview. Planner failures propagate and nothing is written.
    pub async fn build_preview(&self, plan: &TrainingPlan) -> Result<bool> {
        let Some(proposal) = self.propose_window(plan).await? else {
            info!(plan_id = %plan.id, "No upcoming sessions to recalculate");
            return Ok(false);
        };

        let summary = self.summarize(&proposal.request).await;
        let fallback_summary = summary.is_fallback();
        let payload = serde_json::to_string(&proposal.changes).context("Failed to serialize preview")?;
        let now = self.clock.now();

        let mut updated = self.reload(plan.id).await?;
        updated.pending_preview = Some(payload);
        updated.pending_summary = Some(summary.into_text());
        updated.preview_generated_at = Some(now);
        updated.pending_confirmation = true;
        updated.confirmation_requested_at = Some(now);
        updated.confirmation_responded_at = None;
        updated.confirmation_accepted = None;
        updated.updated_at = now;

        self.store
            .commit(PlanCommit::plan(updated))
            .await
            .context("Failed to store preview")?;

        info!(
            plan_id = %plan.id,
            sessions = proposal.changes.len(),
            changed = count_changed(&proposal.changes),
            fallback_summary,
            "Stored plan preview awaiting confirmation"
        );
        Ok(true)
    }

    async fn propose_window(&self, plan: &TrainingPlan) -> Result<Option<WindowProposal>> {
        let context = PlanContext::load(self.store.as_ref(), plan).await?;
        let today = self.clock.today();

        let upcoming: Vec<&TrainingSession> = context
            .sessions
            .iter()
            .filter(|s| s.scheduled_date > today && !s.is_resolved())
            .take(self.policy.preview_window_sessions)
            .collect();
        let (Some(first), Some(last)) = (upcoming.first(), upcoming.last()) else {
            return Ok(None);
        };
        let (window_start, window_end) = (first.scheduled_date, last.scheduled_date);

        let recent = qualifying_sessions(&context.sessions, &self.policy);
        let phase_map = context.runner.cycle_data().map(|(period_start, cycle_length)| {
            self.oracle
                .predict_phases_for_range(period_start, cycle_length, window_start, window_end)
        });

        let request = build_request(
            plan,
            &context,
            RequestWindow {
                start: window_start,
                end: window_end,
                upcoming: &upcoming,
                recent: &recent,
                phase_map,
            },
        );

        let generated = self
            .generator
            .recalculate(&request)
            .await
            .context("AI plan recalculation failed")?;

        let changes: Vec<SessionChange> = upcoming
            .iter()
            .map(|session| SessionChange::from_proposal(session, generated.session_on(session.scheduled_date)))
            .collect();
        let sessions = upcoming.iter().map(|s| (*s).clone()).collect();

        Ok(Some(WindowProposal {
            request,
            sessions,
            changes,
        }))
    }

    async fn summarize(&self, request: &RecalculationRequest) -> PlanSummary {
        match self.generator.summarize(request).await {
            Ok(text) => PlanSummary::Generated(text),
            Err(e) => {
                warn!("Summary generation failed, using default: {}", e);
                PlanSummary::Fallback
            }
        }
    }

    async fn reload(&self, plan_id: Uuid) -> Result<TrainingPlan> {
        self.store
            .get_plan(plan_id)
            .await
            .context("Failed to reload plan")?
            .ok_or_else(|| anyhow!("Plan {} disappeared during recalculation", plan_id))
    }

    // Confirmation

    /// Apply the pending preview. Returns false when there is nothing to
    /// confirm or the apply failed; a failed apply leaves the preview intact.
    pub async fn confirm(&self, plan_id: Uuid) -> bool {
        match self.try_confirm(plan_id).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                error!(%plan_id, "Failed to apply confirmed preview: {:#}", e);
                false
            }
        }
    }

    async fn try_confirm(&self, plan_id: Uuid) -> Result<bool> {
        let Some(mut plan) = self.store.get_plan(plan_id).await? else {
            return Ok(false);
        };
        if !plan.is_active() || !plan.pending_confirmation {
            return Ok(false);
        }

        let now = self.clock.now();
        let Some(changes) = plan.decode_pending_preview().context("Stored preview is corrupt")? else {
            return self.confirm_without_preview(plan).await;
        };

        let sessions = self.store.list_sessions(plan_id).await?;
        let mut arena = SessionArena::new(sessions, now);
        for change in &changes {
            arena.apply_change(change);
        }

        let summary = plan
            .pending_summary
            .clone()
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
        let history = PlanAdaptationHistory::record(plan.id, now, summary.clone(), TRAINING_DEVIATION_REASON, &changes)?;
        let affected = history.sessions_affected;

        plan.last_recalculation_summary = Some(summary);
        plan.summary_viewed_at = None;
        plan.last_recalculated_at = Some(now);
        plan.last_recalculation_job_id = None;
        plan.clear_pending_preview();
        plan.confirmation_responded_at = Some(now);
        plan.confirmation_accepted = Some(true);
        plan.updated_at = now;

        let updated_sessions = arena.into_dirty();
        let touched = updated_sessions.len();
        let commit = PlanCommit::plan(plan)
            .with_sessions(updated_sessions)
            .with_history(history)
            .require_pending();
        if !self.commit_answer(plan_id, commit).await? {
            return Ok(false);
        }

        info!(%plan_id, touched, affected, "Applied confirmed plan preview");
        Ok(true)
    }

    /// Degraded branch: the plan claims a pending confirmation but holds no
    /// payload. Hand the work to an unconditional recalculation job.
    async fn confirm_without_preview(&self, mut plan: TrainingPlan) -> Result<bool> {
        let plan_id = plan.id;
        warn!(plan_id = %plan.id, "Pending confirmation without a stored preview, queueing recalculation");

        let job_id = self
            .jobs
            .enqueue(JobType::RecalculatePlan { plan_id: plan.id })
            .await
            .context("Failed to queue fallback recalculation")?;

        let now = self.clock.now();
        plan.last_recalculation_job_id = Some(job_id);
        plan.clear_pending_preview();
        plan.confirmation_responded_at = Some(now);
        plan.confirmation_accepted = Some(true);
        plan.updated_at = now;
        self.commit_answer(plan_id, PlanCommit::plan(plan).require_pending()).await
    }

    /// Write a confirm or decline. Losing the race to another answer, or to
    /// a regeneration that discarded the preview, is not an error.
    async fn commit_answer(&self, plan_id: Uuid, commit: PlanCommit) -> Result<bool> {
        match self.store.commit(commit).await {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(_)) => {
                info!(%plan_id, "Preview was already answered or discarded");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discard the pending preview. Sessions and history are untouched.
    pub async fn decline(&self, plan_id: Uuid) -> bool {
        let result: Result<bool> = async {
            let Some(mut plan) = self.store.get_plan(plan_id).await? else {
                return Ok(false);
            };
            if !plan.pending_confirmation {
                return Ok(false);
            }

            let now = self.clock.now();
            plan.clear_pending_preview();
            plan.confirmation_responded_at = Some(now);
            plan.confirmation_accepted = Some(false);
            plan.updated_at = now;
            self.commit_answer(plan_id, PlanCommit::plan(plan).require_pending()).await
        }
        .await;

        match result {
            Ok(declined) => {
                if declined {
                    info!(%plan_id, "Plan preview declined");
                }
                declined
            }
            Err(e) => {
                error!(%plan_id, "Failed to decline plan preview: {:#}", e);
                false
            }
        }
    }

    // Unconditional recalculation

    /// Queue an unconditional recalculation and record its job id on the plan.
    /// Refuses (returns None) while another cycle is in flight or pending.
    pub async fn schedule_recalculation(&self, plan_id: Uuid) -> Result<Option<Uuid>> {
        let Some(plan) = self.store.get_plan(plan_id).await? else {
            return Ok(None);
        };
        if !plan.is_active() || plan.pending_confirmation || self.recalculation_in_flight(&plan).await {
            return Ok(None);
        }

        let job_id = self.jobs.enqueue(JobType::RecalculatePlan { plan_id }).await?;

        let mut updated = self.reload(plan_id).await?;
        updated.last_recalculation_job_id = Some(job_id);
        updated.updated_at = self.clock.now();
        self.store.commit(PlanCommit::plan(updated)).await?;

        Ok(Some(job_id))
    }

    /// Recalculate the upcoming window and apply the result immediately.
    /// Returns the number of sessions whose workout actually changed. On
    /// failure the plan's job id is released and the error is returned so
    /// the job queue's retry policy takes over.
    pub async fn recalculate(&self, plan_id: Uuid) -> Result<usize> {
        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| anyhow!("Plan {} not found", plan_id))?;

        match self.recalculate_plan(&plan).await {
            Ok(changed) => Ok(changed),
            Err(e) => {
                self.release_job(plan_id).await;
                Err(e)
            }
        }
    }

    async fn recalculate_plan(&self, plan: &TrainingPlan) -> Result<usize> {
        let now = self.clock.now();

        if !plan.is_active() {
            info!(plan_id = %plan.id, "Plan is no longer active, skipping recalculation");
            self.release_job(plan.id).await;
            return Ok(0);
        }

        let Some(proposal) = self.propose_window(plan).await? else {
            let mut updated = self.reload(plan.id).await?;
            updated.last_recalculated_at = Some(now);
            updated.last_recalculation_job_id = None;
            updated.updated_at = now;
            self.store.commit(PlanCommit::plan(updated)).await?;
            info!(plan_id = %plan.id, "No upcoming sessions, recalculation stamped without changes");
            return Ok(0);
        };

        let mut arena = SessionArena::new(proposal.sessions, now);
        for change in &proposal.changes {
            arena.apply_change(change);
        }

        let summary = self.summarize(&proposal.request).await.into_text();
        let history = PlanAdaptationHistory::record(
            plan.id,
            now,
            summary.clone(),
            TRAINING_DEVIATION_REASON,
            &proposal.changes,
        )?;
        let changed = history.sessions_affected as usize;

        let mut updated = self.reload(plan.id).await?;
        updated.last_recalculation_summary = Some(summary);
        updated.summary_viewed_at = None;
        updated.last_recalculated_at = Some(now);
        updated.last_recalculation_job_id = None;
        // Any stored preview was computed against the sessions just replaced
        updated.clear_pending_preview();
        updated.updated_at = now;

        self.store
            .commit(
                PlanCommit::plan(updated)
                    .with_sessions(arena.into_dirty())
                    .with_history(history),
            )
            .await?;

        info!(plan_id = %plan.id, changed, "Applied unconditional recalculation");
        Ok(changed)
    }

    async fn release_job(&self, plan_id: Uuid) {
        let result: Result<()> = async {
            let mut plan = self.reload(plan_id).await?;
            if plan.last_recalculation_job_id.is_none() {
                return Ok(());
            }
            plan.last_recalculation_job_id = None;
            plan.updated_at = self.clock.now();
            self.store.commit(PlanCommit::plan(plan)).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(%plan_id, "Failed to release recalculation job id: {:#}", e);
        }
    }

    // Read access

    pub async fn pending_preview(&self, plan_id: Uuid) -> Result<Option<PendingPreview>> {
        let Some(plan) = self.store.get_plan(plan_id).await? else {
            return Ok(None);
        };
        if !plan.pending_confirmation {
            return Ok(None);
        }
        let Some(changes) = plan.decode_pending_preview()? else {
            return Ok(None);
        };

        Ok(Some(PendingPreview {
            plan_id,
            changes,
            summary: plan.pending_summary,
            generated_at: plan.preview_generated_at,
            requested_at: plan.confirmation_requested_at,
        }))
    }

    pub async fn adaptation_history(&self, plan_id: Uuid) -> Result<Vec<PlanAdaptationHistory>> {
        Ok(self.store.list_history(plan_id).await?)
    }

    pub async fn mark_summary_viewed(&self, plan_id: Uuid) -> Result<bool> {
        let Some(mut plan) = self.store.get_plan(plan_id).await? else {
            return Ok(false);
        };
        if plan.last_recalculation_summary.is_none() {
            return Ok(false);
        }

        let now = self.clock.now();
        plan.summary_viewed_at = Some(now);
        plan.updated_at = now;
        self.store.commit(PlanCommit::plan(plan)).await?;
        Ok(true)
    }

    pub async fn mark_history_viewed(&self, history_id: Uuid) -> Result<bool> {
        Ok(self.store.mark_history_viewed(history_id, self.clock.now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_summary_uses_default_text() {
        let summary = PlanSummary::Fallback;
        assert!(summary.is_fallback());
        assert_eq!(summary.into_text(), DEFAULT_SUMMARY);
    }

    #[test]
    fn test_generated_summary_is_kept_verbatim() {
        let summary = PlanSummary::Generated("Two easy days added.".to_string());
        assert!(!summary.is_fallback());
        assert_eq!(summary.into_text(), "Two easy days added.");
    }
}
