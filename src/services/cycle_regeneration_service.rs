//! Cycle-triggered regeneration.
//!
//! When authoritative cycle data changes, the near-term window is
//! regenerated and written straight onto the sessions. There is no preview
//! and no ledger entry: this is a correction, not an adaptation.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AdaptationPolicy;
use crate::models::{TrainingPlan, TrainingSession};
use crate::services::clock::Clock;
use crate::services::cycle_phase_service::CyclePhaseOracle;
use crate::services::drift_detection::qualifying_sessions;
use crate::services::plan_generator::AiPlanGenerator;
use crate::services::recalculation_context::{build_request, PlanContext, RequestWindow};
use crate::services::session_apply::SessionArena;
use crate::store::{PlanCommit, PlanStore, StoreError};

#[derive(Clone)]
pub struct CycleRegenerationService {
    store: Arc<dyn PlanStore>,
    generator: Arc<dyn AiPlanGenerator>,
    oracle: Arc<dyn CyclePhaseOracle>,
    clock: Arc<dyn Clock>,
    policy: AdaptationPolicy,
}

impl CycleRegenerationService {
    pub fn new(
        store: Arc<dyn PlanStore>,
        generator: Arc<dyn AiPlanGenerator>,
        oracle: Arc<dyn CyclePhaseOracle>,
        clock: Arc<dyn Clock>,
        policy: AdaptationPolicy,
    ) -> Self {
        Self {
            store,
            generator,
            oracle,
            clock,
            policy,
        }
    }

    /// First and last day of the regeneration window, inclusive
    fn window(&self) -> (NaiveDate, NaiveDate) {
        let today = self.clock.today();
        let days = self.policy.regeneration_window_days.max(1);
        (today, today + Duration::days(days - 1))
    }

    fn eligible<'a>(&self, sessions: &'a [TrainingSession]) -> Vec<&'a TrainingSession> {
        let (start, end) = self.window();
        sessions
            .iter()
            .filter(|s| !s.is_resolved() && s.scheduled_date >= start && s.scheduled_date <= end)
            .collect()
    }

    /// Regenerate uncompleted sessions in the window against new cycle data.
    /// Returns the number of sessions touched.
    pub async fn regenerate_window(&self, plan_id: Uuid, new_cycle_start: NaiveDate, cycle_length: i32) -> Result<usize> {
        let Some(plan) = self.store.get_plan(plan_id).await? else {
            warn!(%plan_id, "Cannot regenerate a missing plan");
            return Ok(0);
        };
        if !plan.is_active() {
            warn!(%plan_id, "Cannot regenerate an inactive plan");
            return Ok(0);
        }

        let context = PlanContext::load(self.store.as_ref(), &plan).await?;
        let eligible = self.eligible(&context.sessions);
        if eligible.is_empty() {
            info!(%plan_id, "No uncompleted sessions in the regeneration window");
            return Ok(0);
        }

        let (window_start, window_end) = self.window();
        let phase_map = self
            .oracle
            .predict_phases_for_range(new_cycle_start, cycle_length, window_start, window_end);

        let recent = qualifying_sessions(&context.sessions, &self.policy);
        let mut request = build_request(
            &plan,
            &context,
            RequestWindow {
                start: window_start,
                end: window_end,
                upcoming: &eligible,
                recent: &recent,
                phase_map: Some(phase_map.clone()),
            },
        );
        request.last_period_start = Some(new_cycle_start);
        request.cycle_length_days = Some(cycle_length);

        let generated = self
            .generator
            .generate(&request)
            .await
            .context("AI plan generation failed")?;

        let mut arena = SessionArena::new(eligible.iter().map(|s| (*s).clone()), self.clock.now());
        for session in &eligible {
            let phase = phase_map.get(&session.scheduled_date).copied();
            match generated.session_on(session.scheduled_date) {
                Some(proposal) => {
                    arena.apply_generated(session.id, proposal, phase);
                }
                None => {
                    if let Some(phase) = phase {
                        arena.refresh_phase(session.id, phase);
                    }
                }
            }
        }

        let touched = arena.dirty_count();
        self.commit_regenerated(plan_id, arena.into_dirty())
            .await
            .context("Failed to store regenerated sessions")?;

        info!(%plan_id, touched, %new_cycle_start, cycle_length, "Regenerated cycle window");
        Ok(touched)
    }

    /// Write regenerated sessions. A pending preview proposing changes for
    /// any of them is discarded in the same commit, so a later confirm
    /// cannot overwrite the regenerated values.
    async fn commit_regenerated(&self, plan_id: Uuid, sessions: Vec<TrainingSession>) -> Result<(), StoreError> {
        if sessions.is_empty() {
            return Ok(());
        }
        let ids: HashSet<Uuid> = sessions.iter().map(|s| s.id).collect();

        // One retry: a confirm or decline landing between reload and commit
        // leaves nothing pending, so the second pass writes sessions only.
        for _ in 0..2 {
            let mut commit = PlanCommit::default().with_sessions(sessions.clone());
            if let Some(mut plan) = self.store.get_plan(plan_id).await? {
                if preview_overlaps(&plan, &ids) {
                    plan.clear_pending_preview();
                    plan.updated_at = self.clock.now();
                    commit.plan = Some(plan);
                    commit = commit.require_pending();
                }
            }
            let discards_preview = commit.plan.is_some();
            match self.store.commit(commit).await {
                Ok(()) => {
                    if discards_preview {
                        info!(%plan_id, "Discarded pending preview superseded by regeneration");
                    }
                    return Ok(());
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        self.store.commit(PlanCommit::default().with_sessions(sessions)).await
    }

    /// Plan is active, the runner has cycle data on file, and the window
    /// holds at least one session that could be regenerated.
    pub async fn can_regenerate(&self, plan_id: Uuid) -> Result<bool> {
        let Some(plan) = self.store.get_plan(plan_id).await? else {
            return Ok(false);
        };
        if !plan.is_active() {
            return Ok(false);
        }

        let has_cycle_data = self
            .store
            .get_runner(plan.runner_id)
            .await?
            .and_then(|runner| runner.cycle_data())
            .is_some();
        if !has_cycle_data {
            return Ok(false);
        }

        let sessions = self.store.list_sessions(plan_id).await?;
        Ok(!self.eligible(&sessions).is_empty())
    }
}

/// A pending preview that names any of `ids`, or one that cannot be
/// decoded, is stale once those sessions are rewritten.
fn preview_overlaps(plan: &TrainingPlan, ids: &HashSet<Uuid>) -> bool {
    if !plan.pending_confirmation {
        return false;
    }
    match plan.decode_pending_preview() {
        Ok(Some(changes)) => changes.iter().any(|c| ids.contains(&c.session_id)),
        Ok(None) => false,
        Err(e) => {
            warn!(plan_id = %plan.id, "Discarding undecodable preview: {}", e);
            true
        }
    }
}
