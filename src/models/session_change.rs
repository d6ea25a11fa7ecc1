use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GeneratedSession, TrainingSession};

/// Old/new values for one session touched by a recalculation.
///
/// Stored as the preview payload and as the history ledger's change list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChange {
    pub session_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub old_distance_km: Option<f64>,
    pub new_distance_km: Option<f64>,
    pub old_duration_minutes: Option<i32>,
    pub new_duration_minutes: Option<i32>,
    pub old_workout_type: String,
    pub new_workout_type: String,
    pub old_intensity: Option<String>,
    pub new_intensity: Option<String>,
    /// Replacement session name, when the planner proposed one
    #[serde(default)]
    pub new_name: Option<String>,
}

impl SessionChange {
    /// Diff `session` against the planner's proposal for the same date.
    /// Without a proposal the new values equal the old ones.
    pub fn from_proposal(session: &TrainingSession, proposal: Option<&GeneratedSession>) -> Self {
        match proposal {
            Some(proposed) => Self {
                session_id: session.id,
                scheduled_date: session.scheduled_date,
                old_distance_km: session.planned_distance_km,
                new_distance_km: proposed.distance_km,
                old_duration_minutes: session.planned_duration_minutes,
                new_duration_minutes: proposed.duration_minutes,
                old_workout_type: session.workout_type.clone(),
                new_workout_type: proposed.workout_type.clone(),
                old_intensity: session.intensity.clone(),
                new_intensity: proposed.intensity.clone(),
                new_name: Some(proposed.name.clone()),
            },
            None => Self::unchanged(session),
        }
    }

    pub fn unchanged(session: &TrainingSession) -> Self {
        Self {
            session_id: session.id,
            scheduled_date: session.scheduled_date,
            old_distance_km: session.planned_distance_km,
            new_distance_km: session.planned_distance_km,
            old_duration_minutes: session.planned_duration_minutes,
            new_duration_minutes: session.planned_duration_minutes,
            old_workout_type: session.workout_type.clone(),
            new_workout_type: session.workout_type.clone(),
            old_intensity: session.intensity.clone(),
            new_intensity: session.intensity.clone(),
            new_name: None,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.old_distance_km != self.new_distance_km
            || self.old_duration_minutes != self.new_duration_minutes
            || self.old_workout_type != self.new_workout_type
            || self.old_intensity != self.new_intensity
    }
}

pub fn count_changed(changes: &[SessionChange]) -> usize {
    changes.iter().filter(|change| change.has_changes()).count()
}
