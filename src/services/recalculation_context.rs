use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::models::{
    PhaseMap, PlannedSessionSummary, Race, RecalculationRequest, RunnerProfile, SessionHistorySummary,
    TrainingPlan, TrainingSession,
};
use crate::store::PlanStore;

/// Plan facts gathered once per recalculation attempt
pub struct PlanContext {
    pub runner: RunnerProfile,
    pub race: Race,
    pub sessions: Vec<TrainingSession>,
}

impl PlanContext {
    pub async fn load(store: &dyn PlanStore, plan: &TrainingPlan) -> Result<Self> {
        let runner = store
            .get_runner(plan.runner_id)
            .await
            .context("Failed to load runner profile")?
            .ok_or_else(|| anyhow!("Runner {} not found for plan {}", plan.runner_id, plan.id))?;
        let race = store
            .get_race(plan.race_id)
            .await
            .context("Failed to load race")?
            .ok_or_else(|| anyhow!("Race {} not found for plan {}", plan.race_id, plan.id))?;
        let sessions = store
            .list_sessions(plan.id)
            .await
            .context("Failed to load plan sessions")?;

        Ok(Self { runner, race, sessions })
    }
}

pub struct RequestWindow<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub upcoming: &'a [&'a TrainingSession],
    pub recent: &'a [&'a TrainingSession],
    pub phase_map: Option<PhaseMap>,
}

pub fn build_request(plan: &TrainingPlan, context: &PlanContext, window: RequestWindow<'_>) -> RecalculationRequest {
    RecalculationRequest {
        plan_name: plan.name.clone(),
        race_name: context.race.name.clone(),
        race_date: context.race.race_date,
        race_distance_km: context.race.distance_km,
        goal_time: context.race.goal_time.clone(),
        fitness_level: context.runner.fitness_level.clone(),
        weekly_mileage_km: context.runner.weekly_mileage_km,
        cycle_length_days: context.runner.cycle_length_days,
        last_period_start: context.runner.last_period_start,
        cycle_regularity: context.runner.cycle_regularity.clone(),
        window_start: window.start,
        window_end: window.end,
        recent_sessions: window.recent.iter().map(|s| SessionHistorySummary::from(*s)).collect(),
        upcoming_sessions: window.upcoming.iter().map(|s| PlannedSessionSummary::from(*s)).collect(),
        phase_map: window.phase_map,
    }
}
