//! Persistence seam for the adaptation engine.
//!
//! Reads are fine-grained; every engine state transition writes through a
//! single [`PlanStore::commit`] so that a transition is either fully visible
//! or not visible at all.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PlanAdaptationHistory, Race, RunnerProfile, TrainingPlan, TrainingSession};

mod memory;
mod postgres;

pub use memory::InMemoryPlanStore;
pub use postgres::PgPlanStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Plan not found: {0}")]
    PlanNotFound(Uuid),
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Runner not found: {0}")]
    RunnerNotFound(Uuid),
    #[error("Plan {0} no longer awaits confirmation")]
    Conflict(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rows written by one state transition
#[derive(Debug, Clone, Default)]
pub struct PlanCommit {
    pub plan: Option<TrainingPlan>,
    pub sessions: Vec<TrainingSession>,
    pub history: Option<PlanAdaptationHistory>,
    /// Only write if the stored plan still awaits confirmation
    pub require_pending: bool,
}

impl PlanCommit {
    pub fn plan(plan: TrainingPlan) -> Self {
        Self {
            plan: Some(plan),
            ..Self::default()
        }
    }

    pub fn with_sessions(mut self, sessions: Vec<TrainingSession>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_history(mut self, history: PlanAdaptationHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Guard the plan write on the stored row still having a pending
    /// preview; otherwise the commit fails with [`StoreError::Conflict`].
    pub fn require_pending(mut self) -> Self {
        self.require_pending = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_none() && self.sessions.is_empty() && self.history.is_none()
    }
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<TrainingPlan>, StoreError>;

    async fn list_active_plans(&self) -> Result<Vec<TrainingPlan>, StoreError>;

    async fn get_runner(&self, runner_id: Uuid) -> Result<Option<RunnerProfile>, StoreError>;

    async fn update_runner_cycle(
        &self,
        runner_id: Uuid,
        last_period_start: NaiveDate,
        cycle_length_days: i32,
    ) -> Result<(), StoreError>;

    async fn get_race(&self, race_id: Uuid) -> Result<Option<Race>, StoreError>;

    /// All sessions of a plan, ordered by scheduled date ascending
    async fn list_sessions(&self, plan_id: Uuid) -> Result<Vec<TrainingSession>, StoreError>;

    /// Ledger entries for a plan, newest first
    async fn list_history(&self, plan_id: Uuid) -> Result<Vec<PlanAdaptationHistory>, StoreError>;

    async fn mark_history_viewed(&self, history_id: Uuid, viewed_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Write every row of `commit` in one transaction.
    async fn commit(&self, commit: PlanCommit) -> Result<(), StoreError>;
}
