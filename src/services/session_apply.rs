//! Shared in-place overwrite primitive for both mutation paths.
//!
//! Sessions are loaded into an arena keyed by id; changes overwrite the
//! matching entry and mark it dirty. Identity is never created or dropped,
//! so applying the same change twice yields the same rows.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use uuid::Uuid;

use crate::models::{CyclePhase, GeneratedSession, SessionChange, TrainingSession};

pub struct SessionArena {
    sessions: HashMap<Uuid, TrainingSession>,
    dirty: BTreeSet<Uuid>,
    now: DateTime<Utc>,
}

impl SessionArena {
    pub fn new(sessions: impl IntoIterator<Item = TrainingSession>, now: DateTime<Utc>) -> Self {
        Self {
            sessions: sessions.into_iter().map(|s| (s.id, s)).collect(),
            dirty: BTreeSet::new(),
            now,
        }
    }

    #[cfg(test)]
    fn get(&self, session_id: Uuid) -> Option<&TrainingSession> {
        self.sessions.get(&session_id)
    }

    /// Overwrite workout attributes with a change's new values. Returns false
    /// when there is nothing to change or the session is gone or resolved.
    pub fn apply_change(&mut self, change: &SessionChange) -> bool {
        if !change.has_changes() {
            return false;
        }
        let Some(session) = self.sessions.get_mut(&change.session_id) else {
            warn!(session_id = %change.session_id, "Session in change set no longer exists");
            return false;
        };
        if session.is_resolved() {
            warn!(session_id = %session.id, "Session was completed or skipped after the change was proposed");
            return false;
        }

        if let Some(name) = &change.new_name {
            session.name = name.clone();
        }
        session.planned_distance_km = change.new_distance_km;
        session.planned_duration_minutes = change.new_duration_minutes;
        session.workout_type = change.new_workout_type.clone();
        session.intensity = change.new_intensity.clone();
        session.updated_at = self.now;
        self.dirty.insert(session.id);
        true
    }

    /// Overwrite a session wholesale from a generated proposal. `phase` comes
    /// from the freshly computed phase map and wins over the proposal's own.
    pub fn apply_generated(
        &mut self,
        session_id: Uuid,
        proposal: &GeneratedSession,
        phase: Option<CyclePhase>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };

        session.name = proposal.name.clone();
        session.workout_type = proposal.workout_type.clone();
        session.planned_distance_km = proposal.distance_km;
        session.planned_duration_minutes = proposal.duration_minutes;
        session.intensity = proposal.intensity.clone();

        if let Some(phase) = phase.or(proposal.cycle_phase) {
            let guidance = match (&proposal.phase_guidance, proposal.cycle_phase) {
                (Some(text), Some(proposed)) if proposed == phase => text.clone(),
                _ => phase.guidance().to_string(),
            };
            session.cycle_phase = Some(phase);
            session.phase_guidance = Some(guidance);
        }
        session.updated_at = self.now;
        self.dirty.insert(session_id);
        true
    }

    /// Refresh only the cycle phase and its guidance text
    pub fn refresh_phase(&mut self, session_id: Uuid, phase: CyclePhase) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };

        session.cycle_phase = Some(phase);
        session.phase_guidance = Some(phase.guidance().to_string());
        session.updated_at = self.now;
        self.dirty.insert(session_id);
        true
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Sessions touched since the arena was built
    pub fn into_dirty(mut self) -> Vec<TrainingSession> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session(completed: bool) -> TrainingSession {
        let created = Utc::now() - chrono::Duration::days(10);
        TrainingSession {
            id: Uuid::new_v4(),
            plan_id: Uuid::nil(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            name: "Tempo".to_string(),
            workout_type: "tempo".to_string(),
            planned_distance_km: Some(10.0),
            planned_duration_minutes: Some(55),
            intensity: Some("moderate".to_string()),
            cycle_phase: None,
            phase_guidance: None,
            completed_at: completed.then_some(created),
            actual_distance_km: None,
            actual_duration_minutes: None,
            is_skipped: false,
            skip_reason: None,
            was_modified: false,
            rpe: None,
            notes: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn easier(session: &TrainingSession) -> SessionChange {
        let mut change = SessionChange::unchanged(session);
        change.new_distance_km = Some(6.0);
        change.new_workout_type = "easy".to_string();
        change.new_name = Some("Easy run".to_string());
        change
    }

    #[test]
    fn test_apply_change_overwrites_in_place() {
        let now = Utc::now();
        let original = session(false);
        let mut arena = SessionArena::new(vec![original.clone()], now);

        assert!(arena.apply_change(&easier(&original)));
        let updated = arena.into_dirty();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, original.id);
        assert_eq!(updated[0].planned_distance_km, Some(6.0));
        assert_eq!(updated[0].workout_type, "easy");
        assert_eq!(updated[0].name, "Easy run");
        assert_eq!(updated[0].planned_duration_minutes, Some(55));
        assert_eq!(updated[0].updated_at, now);
    }

    #[test]
    fn test_applying_twice_is_idempotent() {
        let original = session(false);
        let change = easier(&original);
        let mut arena = SessionArena::new(vec![original], Utc::now());

        arena.apply_change(&change);
        let once = arena.get(change.session_id).cloned();
        arena.apply_change(&change);

        assert_eq!(arena.get(change.session_id).cloned(), once);
        assert_eq!(arena.dirty_count(), 1);
    }

    #[test]
    fn test_resolved_and_missing_sessions_are_skipped() {
        let done = session(true);
        let change = easier(&done);
        let mut arena = SessionArena::new(vec![done], Utc::now());

        assert!(!arena.apply_change(&change));
        let mut orphan = change.clone();
        orphan.session_id = Uuid::new_v4();
        assert!(!arena.apply_change(&orphan));
        assert!(arena.into_dirty().is_empty());
    }

    #[test]
    fn test_unchanged_entries_are_not_written() {
        let original = session(false);
        let mut arena = SessionArena::new(vec![original.clone()], Utc::now());

        assert!(!arena.apply_change(&SessionChange::unchanged(&original)));
        assert_eq!(arena.dirty_count(), 0);
    }

    #[test]
    fn test_refresh_phase_sets_guidance() {
        let original = session(false);
        let mut arena = SessionArena::new(vec![original.clone()], Utc::now());

        assert!(arena.refresh_phase(original.id, CyclePhase::Luteal));
        let updated = arena.into_dirty();
        assert_eq!(updated[0].cycle_phase, Some(CyclePhase::Luteal));
        assert_eq!(updated[0].phase_guidance.as_deref(), Some(CyclePhase::Luteal.guidance()));
        assert_eq!(updated[0].workout_type, "tempo");
    }
}
