//! Decides whether a plan has drifted far enough from what the runner
//! actually does to warrant a recalculation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::config::AdaptationPolicy;
use crate::models::{TrainingPlan, TrainingSession};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftAssessment {
    pub qualifying_sessions: usize,
    pub off_track_sessions: usize,
    pub off_track_ratio: f64,
    pub verdict: DriftVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftVerdict {
    InsufficientSignal,
    OnTrack,
    Drifted,
}

impl DriftAssessment {
    pub fn is_drifted(&self) -> bool {
        self.verdict == DriftVerdict::Drifted
    }
}

/// The most recent completed or skipped sessions, newest first. Skipped
/// sessions count even when scheduled in the future: runners skip ahead.
pub fn qualifying_sessions<'a>(sessions: &'a [TrainingSession], policy: &AdaptationPolicy) -> Vec<&'a TrainingSession> {
    let mut qualifying: Vec<&TrainingSession> = sessions.iter().filter(|s| s.is_resolved()).collect();
    qualifying.sort_by(|a, b| b.scheduled_date.cmp(&a.scheduled_date));
    qualifying.truncate(policy.lookback_sessions);
    qualifying
}

pub fn assess_drift(sessions: &[TrainingSession], policy: &AdaptationPolicy) -> DriftAssessment {
    let qualifying = qualifying_sessions(sessions, policy);
    let off_track = qualifying.iter().filter(|s| s.is_off_track()).count();

    if qualifying.len() < policy.min_qualifying_sessions || qualifying.is_empty() {
        return DriftAssessment {
            qualifying_sessions: qualifying.len(),
            off_track_sessions: off_track,
            off_track_ratio: 0.0,
            verdict: DriftVerdict::InsufficientSignal,
        };
    }

    let ratio = off_track as f64 / qualifying.len() as f64;
    let verdict = if ratio >= policy.off_track_threshold {
        DriftVerdict::Drifted
    } else {
        DriftVerdict::OnTrack
    };

    DriftAssessment {
        qualifying_sessions: qualifying.len(),
        off_track_sessions: off_track,
        off_track_ratio: ratio,
        verdict,
    }
}

/// Still inside the cool-down after the last applied recalculation
pub fn in_cooldown(plan: &TrainingPlan, policy: &AdaptationPolicy, now: DateTime<Utc>) -> bool {
    policy.cooldown_enabled
        && plan
            .last_recalculated_at
            .map(|at| now - at < Duration::days(policy.cooldown_days))
            .unwrap_or(false)
}

/// Plan is too young to be judged
pub fn early_plan_exempt(plan: &TrainingPlan, policy: &AdaptationPolicy, today: NaiveDate) -> bool {
    policy.early_plan_exemption_enabled
        && today < plan.start_date + Duration::days(policy.early_plan_exemption_days)
}
