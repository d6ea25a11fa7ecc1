use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{PlanCommit, PlanStore, StoreError};
use crate::models::{PlanAdaptationHistory, PlanStatus, Race, RunnerProfile, TrainingPlan, TrainingSession};

const PLAN_COLUMNS: &str = "id, runner_id, race_id, name, status, start_date, \
    last_recalculated_at, last_recalculation_job_id, last_recalculation_summary, summary_viewed_at, \
    pending_confirmation, pending_preview, pending_summary, preview_generated_at, \
    confirmation_requested_at, confirmation_responded_at, confirmation_accepted, \
    created_at, updated_at";

const SESSION_COLUMNS: &str = "id, plan_id, scheduled_date, name, workout_type, \
    planned_distance_km, planned_duration_minutes, intensity, cycle_phase, phase_guidance, \
    completed_at, actual_distance_km, actual_duration_minutes, is_skipped, skip_reason, \
    was_modified, rpe, notes, created_at, updated_at";

#[derive(Clone)]
pub struct PgPlanStore {
    db: PgPool,
}

impl PgPlanStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<TrainingPlan>, StoreError> {
        let query = format!("SELECT {PLAN_COLUMNS} FROM training_plans WHERE id = $1");
        let plan = sqlx::query_as::<_, TrainingPlan>(&query)
            .bind(plan_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(plan)
    }

    async fn list_active_plans(&self) -> Result<Vec<TrainingPlan>, StoreError> {
        let query = format!("SELECT {PLAN_COLUMNS} FROM training_plans WHERE status = $1 ORDER BY created_at ASC");
        let plans = sqlx::query_as::<_, TrainingPlan>(&query)
            .bind(PlanStatus::Active)
            .fetch_all(&self.db)
            .await?;

        Ok(plans)
    }

    async fn get_runner(&self, runner_id: Uuid) -> Result<Option<RunnerProfile>, StoreError> {
        let runner = sqlx::query_as::<_, RunnerProfile>(
            r#"
            SELECT id, fitness_level, weekly_mileage_km, cycle_length_days, last_period_start, cycle_regularity
            FROM runner_profiles
            WHERE id = $1
            "#,
        )
        .bind(runner_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(runner)
    }

    async fn update_runner_cycle(
        &self,
        runner_id: Uuid,
        last_period_start: NaiveDate,
        cycle_length_days: i32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE runner_profiles SET last_period_start = $2, cycle_length_days = $3 WHERE id = $1",
        )
        .bind(runner_id)
        .bind(last_period_start)
        .bind(cycle_length_days)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RunnerNotFound(runner_id));
        }
        Ok(())
    }

    async fn get_race(&self, race_id: Uuid) -> Result<Option<Race>, StoreError> {
        let race = sqlx::query_as::<_, Race>(
            "SELECT id, name, race_date, distance_km, goal_time FROM races WHERE id = $1",
        )
        .bind(race_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(race)
    }

    async fn list_sessions(&self, plan_id: Uuid) -> Result<Vec<TrainingSession>, StoreError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions WHERE plan_id = $1 ORDER BY scheduled_date ASC"
        );
        let sessions = sqlx::query_as::<_, TrainingSession>(&query)
            .bind(plan_id)
            .fetch_all(&self.db)
            .await?;

        Ok(sessions)
    }

    async fn list_history(&self, plan_id: Uuid) -> Result<Vec<PlanAdaptationHistory>, StoreError> {
        let entries = sqlx::query_as::<_, PlanAdaptationHistory>(
            r#"
            SELECT id, plan_id, applied_at, viewed_at, summary, sessions_affected, trigger_reason, changes
            FROM plan_adaptation_history
            WHERE plan_id = $1
            ORDER BY applied_at DESC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    async fn mark_history_viewed(&self, history_id: Uuid, viewed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE plan_adaptation_history SET viewed_at = $2 WHERE id = $1")
            .bind(history_id)
            .bind(viewed_at)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(&self, commit: PlanCommit) -> Result<(), StoreError> {
        if commit.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;

        if let Some(plan) = &commit.plan {
            let result = sqlx::query(
                r#"
                UPDATE training_plans
                SET
                    name = $2,
                    status = $3,
                    last_recalculated_at = $4,
                    last_recalculation_job_id = $5,
                    last_recalculation_summary = $6,
                    summary_viewed_at = $7,
                    pending_confirmation = $8,
                    pending_preview = $9,
                    pending_summary = $10,
                    preview_generated_at = $11,
                    confirmation_requested_at = $12,
                    confirmation_responded_at = $13,
                    confirmation_accepted = $14,
                    updated_at = $15
                WHERE id = $1 AND (NOT $16 OR pending_confirmation)
                "#,
            )
            .bind(plan.id)
            .bind(&plan.name)
            .bind(plan.status)
            .bind(plan.last_recalculated_at)
            .bind(plan.last_recalculation_job_id)
            .bind(&plan.last_recalculation_summary)
            .bind(plan.summary_viewed_at)
            .bind(plan.pending_confirmation)
            .bind(&plan.pending_preview)
            .bind(&plan.pending_summary)
            .bind(plan.preview_generated_at)
            .bind(plan.confirmation_requested_at)
            .bind(plan.confirmation_responded_at)
            .bind(plan.confirmation_accepted)
            .bind(plan.updated_at)
            .bind(commit.require_pending)
            .execute(&mut *tx)
            .await?;

            // Dropping `tx` here rolls the transition back
            if result.rows_affected() == 0 {
                if commit.require_pending {
                    return Err(StoreError::Conflict(plan.id));
                }
                return Err(StoreError::PlanNotFound(plan.id));
            }
        }

        for session in &commit.sessions {
            let result = sqlx::query(
                r#"
                UPDATE training_sessions
                SET
                    name = $2,
                    workout_type = $3,
                    planned_distance_km = $4,
                    planned_duration_minutes = $5,
                    intensity = $6,
                    cycle_phase = $7,
                    phase_guidance = $8,
                    updated_at = $9
                WHERE id = $1
                "#,
            )
            .bind(session.id)
            .bind(&session.name)
            .bind(&session.workout_type)
            .bind(session.planned_distance_km)
            .bind(session.planned_duration_minutes)
            .bind(&session.intensity)
            .bind(session.cycle_phase)
            .bind(&session.phase_guidance)
            .bind(session.updated_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::SessionNotFound(session.id));
            }
        }

        if let Some(entry) = &commit.history {
            sqlx::query(
                r#"
                INSERT INTO plan_adaptation_history (
                    id, plan_id, applied_at, viewed_at, summary, sessions_affected, trigger_reason, changes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.id)
            .bind(entry.plan_id)
            .bind(entry.applied_at)
            .bind(entry.viewed_at)
            .bind(&entry.summary)
            .bind(entry.sessions_affected)
            .bind(&entry.trigger_reason)
            .bind(&entry.changes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            sessions = commit.sessions.len(),
            history = commit.history.is_some(),
            "Committed plan transition"
        );
        Ok(())
    }
}
