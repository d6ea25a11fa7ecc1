use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::CyclePhase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrainingSession {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub name: String,
    pub workout_type: String,
    pub planned_distance_km: Option<f64>,
    pub planned_duration_minutes: Option<i32>,
    pub intensity: Option<String>,
    pub cycle_phase: Option<CyclePhase>,
    pub phase_guidance: Option<String>,

    // Completion state
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_distance_km: Option<f64>,
    pub actual_duration_minutes: Option<i32>,
    pub is_skipped: bool,
    pub skip_reason: Option<String>,
    pub was_modified: bool,
    pub rpe: Option<i32>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingSession {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Completed or skipped: historical input, never a recalculation target.
    pub fn is_resolved(&self) -> bool {
        self.is_completed() || self.is_skipped
    }

    /// Skipped sessions and sessions the runner altered count against the plan.
    pub fn is_off_track(&self) -> bool {
        self.is_skipped || self.was_modified
    }
}

/// Read-only digest of a past session handed to the AI planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistorySummary {
    pub scheduled_date: NaiveDate,
    pub workout_type: String,
    pub planned_distance_km: Option<f64>,
    pub actual_distance_km: Option<f64>,
    pub planned_duration_minutes: Option<i32>,
    pub actual_duration_minutes: Option<i32>,
    pub is_skipped: bool,
    pub skip_reason: Option<String>,
    pub was_modified: bool,
    pub rpe: Option<i32>,
    pub notes: Option<String>,
}

impl From<&TrainingSession> for SessionHistorySummary {
    fn from(session: &TrainingSession) -> Self {
        Self {
            scheduled_date: session.scheduled_date,
            workout_type: session.workout_type.clone(),
            planned_distance_km: session.planned_distance_km,
            actual_distance_km: session.actual_distance_km,
            planned_duration_minutes: session.planned_duration_minutes,
            actual_duration_minutes: session.actual_duration_minutes,
            is_skipped: session.is_skipped,
            skip_reason: session.skip_reason.clone(),
            was_modified: session.was_modified,
            rpe: session.rpe,
            notes: session.notes.clone(),
        }
    }
}

/// An upcoming session as currently planned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSessionSummary {
    pub scheduled_date: NaiveDate,
    pub name: String,
    pub workout_type: String,
    pub planned_distance_km: Option<f64>,
    pub planned_duration_minutes: Option<i32>,
    pub intensity: Option<String>,
}

impl From<&TrainingSession> for PlannedSessionSummary {
    fn from(session: &TrainingSession) -> Self {
        Self {
            scheduled_date: session.scheduled_date,
            name: session.name.clone(),
            workout_type: session.workout_type.clone(),
            planned_distance_km: session.planned_distance_km,
            planned_duration_minutes: session.planned_duration_minutes,
            intensity: session.intensity.clone(),
        }
    }
}
