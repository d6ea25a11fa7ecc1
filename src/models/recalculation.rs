use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CyclePhase, PhaseMap, PlannedSessionSummary, SessionHistorySummary};

/// Everything the AI planner is told when asked to revise a plan window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalculationRequest {
    // Plan and race facts
    pub plan_name: String,
    pub race_name: String,
    pub race_date: NaiveDate,
    pub race_distance_km: f64,
    pub goal_time: Option<String>,

    // Runner facts
    pub fitness_level: String,
    pub weekly_mileage_km: Option<f64>,
    pub cycle_length_days: Option<i32>,
    pub last_period_start: Option<NaiveDate>,
    pub cycle_regularity: Option<String>,

    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub recent_sessions: Vec<SessionHistorySummary>,
    pub upcoming_sessions: Vec<PlannedSessionSummary>,
    /// Present only when the runner has cycle data on file
    pub phase_map: Option<PhaseMap>,
}

/// Replacement session list returned by the planner
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedPlan {
    #[serde(default)]
    pub sessions: Vec<GeneratedSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSession {
    pub scheduled_date: NaiveDate,
    pub name: String,
    pub workout_type: String,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub intensity: Option<String>,
    #[serde(default)]
    pub cycle_phase: Option<CyclePhase>,
    #[serde(default)]
    pub phase_guidance: Option<String>,
}

impl GeneratedPlan {
    /// The proposal for a calendar date; the first one wins if the planner repeats a date.
    pub fn session_on(&self, date: NaiveDate) -> Option<&GeneratedSession> {
        self.sessions.iter().find(|session| session.scheduled_date == date)
    }
}
