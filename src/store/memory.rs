use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PlanCommit, PlanStore, StoreError};
use crate::models::{PlanAdaptationHistory, Race, RunnerProfile, TrainingPlan, TrainingSession};

#[derive(Default)]
struct StoreState {
    plans: HashMap<Uuid, TrainingPlan>,
    runners: HashMap<Uuid, RunnerProfile>,
    races: HashMap<Uuid, Race>,
    sessions: HashMap<Uuid, TrainingSession>,
    history: Vec<PlanAdaptationHistory>,
}

/// Process-local store used by tests and single-node runs
#[derive(Default)]
pub struct InMemoryPlanStore {
    state: RwLock<StoreState>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_plan(&self, plan: TrainingPlan) {
        self.state.write().await.plans.insert(plan.id, plan);
    }

    pub async fn insert_runner(&self, runner: RunnerProfile) {
        self.state.write().await.runners.insert(runner.id, runner);
    }

    pub async fn insert_race(&self, race: Race) {
        self.state.write().await.races.insert(race.id, race);
    }

    pub async fn insert_sessions(&self, sessions: impl IntoIterator<Item = TrainingSession>) {
        let mut state = self.state.write().await;
        for session in sessions {
            state.sessions.insert(session.id, session);
        }
    }

    pub async fn get_session(&self, session_id: Uuid) -> Option<TrainingSession> {
        self.state.read().await.sessions.get(&session_id).cloned()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<TrainingPlan>, StoreError> {
        Ok(self.state.read().await.plans.get(&plan_id).cloned())
    }

    async fn list_active_plans(&self) -> Result<Vec<TrainingPlan>, StoreError> {
        let state = self.state.read().await;
        Ok(state.plans.values().filter(|plan| plan.is_active()).cloned().collect())
    }

    async fn get_runner(&self, runner_id: Uuid) -> Result<Option<RunnerProfile>, StoreError> {
        Ok(self.state.read().await.runners.get(&runner_id).cloned())
    }

    async fn update_runner_cycle(
        &self,
        runner_id: Uuid,
        last_period_start: NaiveDate,
        cycle_length_days: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let runner = state
            .runners
            .get_mut(&runner_id)
            .ok_or(StoreError::RunnerNotFound(runner_id))?;
        runner.last_period_start = Some(last_period_start);
        runner.cycle_length_days = Some(cycle_length_days);
        Ok(())
    }

    async fn get_race(&self, race_id: Uuid) -> Result<Option<Race>, StoreError> {
        Ok(self.state.read().await.races.get(&race_id).cloned())
    }

    async fn list_sessions(&self, plan_id: Uuid) -> Result<Vec<TrainingSession>, StoreError> {
        let state = self.state.read().await;
        let mut sessions: Vec<TrainingSession> = state
            .sessions
            .values()
            .filter(|session| session.plan_id == plan_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.scheduled_date);
        Ok(sessions)
    }

    async fn list_history(&self, plan_id: Uuid) -> Result<Vec<PlanAdaptationHistory>, StoreError> {
        let state = self.state.read().await;
        let mut entries: Vec<PlanAdaptationHistory> = state
            .history
            .iter()
            .filter(|entry| entry.plan_id == plan_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(entries)
    }

    async fn mark_history_viewed(&self, history_id: Uuid, viewed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.history.iter_mut().find(|entry| entry.id == history_id) {
            Some(entry) => {
                entry.viewed_at = Some(viewed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(&self, commit: PlanCommit) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        // Validate everything before the first write so a failed commit leaves no trace
        if let Some(plan) = &commit.plan {
            match state.plans.get(&plan.id) {
                None => return Err(StoreError::PlanNotFound(plan.id)),
                Some(stored) if commit.require_pending && !stored.pending_confirmation => {
                    return Err(StoreError::Conflict(plan.id));
                }
                Some(_) => {}
            }
        }
        if let Some(missing) = commit
            .sessions
            .iter()
            .find(|session| !state.sessions.contains_key(&session.id))
        {
            return Err(StoreError::SessionNotFound(missing.id));
        }

        if let Some(plan) = commit.plan {
            state.plans.insert(plan.id, plan);
        }
        for session in commit.sessions {
            state.sessions.insert(session.id, session);
        }
        if let Some(entry) = commit.history {
            state.history.push(entry);
        }

        Ok(())
    }
}
