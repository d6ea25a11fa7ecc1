use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::SessionChange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrainingPlan {
    pub id: Uuid,
    pub runner_id: Uuid,
    pub race_id: Uuid,
    pub name: String,
    pub status: PlanStatus,
    pub start_date: NaiveDate,

    // Recalculation bookkeeping
    pub last_recalculated_at: Option<DateTime<Utc>>,
    pub last_recalculation_job_id: Option<Uuid>,
    pub last_recalculation_summary: Option<String>,
    pub summary_viewed_at: Option<DateTime<Utc>>,

    // Pending preview bookkeeping
    pub pending_confirmation: bool,
    /// Serialized `Vec<SessionChange>` awaiting confirmation
    pub pending_preview: Option<String>,
    pub pending_summary: Option<String>,
    pub preview_generated_at: Option<DateTime<Utc>>,
    pub confirmation_requested_at: Option<DateTime<Utc>>,
    pub confirmation_responded_at: Option<DateTime<Utc>>,
    pub confirmation_accepted: Option<bool>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Archived,
}

impl TrainingPlan {
    pub fn new(runner_id: Uuid, race_id: Uuid, name: impl Into<String>, start_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            runner_id,
            race_id,
            name: name.into(),
            status: PlanStatus::Active,
            start_date,
            last_recalculated_at: None,
            last_recalculation_job_id: None,
            last_recalculation_summary: None,
            summary_viewed_at: None,
            pending_confirmation: false,
            pending_preview: None,
            pending_summary: None,
            preview_generated_at: None,
            confirmation_requested_at: None,
            confirmation_responded_at: None,
            confirmation_accepted: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }

    /// Drop the stored proposal without touching the confirmation outcome fields.
    pub fn clear_pending_preview(&mut self) {
        self.pending_confirmation = false;
        self.pending_preview = None;
        self.pending_summary = None;
        self.preview_generated_at = None;
    }

    /// Decode the stored proposal, if any.
    pub fn decode_pending_preview(&self) -> serde_json::Result<Option<Vec<SessionChange>>> {
        self.pending_preview
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }
}

/// Read-only view of a proposal awaiting the runner's decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPreview {
    pub plan_id: Uuid,
    pub changes: Vec<SessionChange>,
    pub summary: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub requested_at: Option<DateTime<Utc>>,
}

impl PendingPreview {
    pub fn changed_session_count(&self) -> usize {
        self.changes.iter().filter(|change| change.has_changes()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RunnerProfile {
    pub id: Uuid,
    pub fitness_level: String,
    pub weekly_mileage_km: Option<f64>,
    pub cycle_length_days: Option<i32>,
    pub last_period_start: Option<NaiveDate>,
    pub cycle_regularity: Option<String>,
}

impl RunnerProfile {
    /// Both a reference period start and a cycle length are on file.
    pub fn cycle_data(&self) -> Option<(NaiveDate, i32)> {
        match (self.last_period_start, self.cycle_length_days) {
            (Some(start), Some(length)) if length > 0 => Some((start, length)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Race {
    pub id: Uuid,
    pub name: String,
    pub race_date: NaiveDate,
    pub distance_km: f64,
    pub goal_time: Option<String>,
}
