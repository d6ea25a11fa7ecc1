use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{count_changed, SessionChange};

pub const TRAINING_DEVIATION_REASON: &str = "Training pattern deviation detected";

/// Append-only ledger entry for an applied adaptation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanAdaptationHistory {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub sessions_affected: i32,
    pub trigger_reason: String,
    /// Serialized `Vec<SessionChange>`, exactly as applied
    pub changes: String,
}

impl PlanAdaptationHistory {
    pub fn record(
        plan_id: Uuid,
        applied_at: DateTime<Utc>,
        summary: String,
        trigger_reason: &str,
        changes: &[SessionChange],
    ) -> serde_json::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            plan_id,
            applied_at,
            viewed_at: None,
            summary,
            sessions_affected: count_changed(changes) as i32,
            trigger_reason: trigger_reason.to_string(),
            changes: serde_json::to_string(changes)?,
        })
    }

    pub fn decode_changes(&self) -> serde_json::Result<Vec<SessionChange>> {
        serde_json::from_str(&self.changes)
    }
}
