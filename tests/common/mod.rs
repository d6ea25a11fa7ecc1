#![allow(dead_code)]

use ai_coach_adaptive::config::AdaptationPolicy;
use ai_coach_adaptive::models::{
    GeneratedPlan, GeneratedSession, PlanAdaptationHistory, Race, RecalculationRequest, RunnerProfile, TrainingPlan,
    TrainingSession,
};
use ai_coach_adaptive::services::{
    AiPlanGenerator, CycleRegenerationService, FixedClock, JobQueue, JobQueueError, JobState, JobType,
    PlanAdaptationService, PlanGeneratorError, StandardCycleCalculator,
};
use ai_coach_adaptive::store::{InMemoryPlanStore, PlanCommit, PlanStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use mockall::mock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub Planner {}

    #[async_trait]
    impl AiPlanGenerator for Planner {
        async fn generate(&self, request: &RecalculationRequest) -> Result<GeneratedPlan, PlanGeneratorError>;
        async fn recalculate(&self, request: &RecalculationRequest) -> Result<GeneratedPlan, PlanGeneratorError>;
        async fn summarize(&self, request: &RecalculationRequest) -> Result<String, PlanGeneratorError>;
    }
}

mock! {
    pub Jobs {}

    #[async_trait]
    impl JobQueue for Jobs {
        async fn enqueue(&self, job: JobType) -> Result<Uuid, JobQueueError>;
        async fn get_state(&self, job_id: Uuid) -> JobState;
    }
}

/// 2026-03-15 08:00 UTC
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 8, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    fixed_now().date_naive()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub fn planned_session(plan_id: Uuid, date: NaiveDate, workout_type: &str) -> TrainingSession {
    TrainingSession {
        id: Uuid::new_v4(),
        plan_id,
        scheduled_date: date,
        name: format!("{} run", workout_type),
        workout_type: workout_type.to_string(),
        planned_distance_km: Some(8.0),
        planned_duration_minutes: Some(45),
        intensity: Some("moderate".to_string()),
        cycle_phase: None,
        phase_guidance: None,
        completed_at: None,
        actual_distance_km: None,
        actual_duration_minutes: None,
        is_skipped: false,
        skip_reason: None,
        was_modified: false,
        rpe: None,
        notes: None,
        created_at: fixed_now() - Duration::days(30),
        updated_at: fixed_now() - Duration::days(30),
    }
}

pub fn completed_session(plan_id: Uuid, date: NaiveDate) -> TrainingSession {
    let mut session = planned_session(plan_id, date, "easy");
    session.completed_at = Some(fixed_now() - Duration::days(1));
    session.actual_distance_km = Some(8.0);
    session.actual_duration_minutes = Some(46);
    session.rpe = Some(5);
    session
}

pub fn skipped_session(plan_id: Uuid, date: NaiveDate) -> TrainingSession {
    let mut session = planned_session(plan_id, date, "easy");
    session.is_skipped = true;
    session.skip_reason = Some("Work trip".to_string());
    session
}

/// `on_track` completed sessions followed by `off_track` skipped ones,
/// walking backwards from yesterday.
pub fn recent_sessions(plan_id: Uuid, on_track: usize, off_track: usize) -> Vec<TrainingSession> {
    let mut sessions = Vec::new();
    let mut day = -1;
    for _ in 0..on_track {
        sessions.push(completed_session(plan_id, days_from_today(day)));
        day -= 1;
    }
    for _ in 0..off_track {
        sessions.push(skipped_session(plan_id, days_from_today(day)));
        day -= 1;
    }
    sessions
}

/// Unresolved tempo sessions on consecutive days starting tomorrow
pub fn upcoming_sessions(plan_id: Uuid, count: usize) -> Vec<TrainingSession> {
    (1..=count as i64)
        .map(|day| planned_session(plan_id, days_from_today(day), "tempo"))
        .collect()
}

pub fn proposal(date: NaiveDate, workout_type: &str) -> GeneratedSession {
    GeneratedSession {
        scheduled_date: date,
        name: format!("Adjusted {}", workout_type),
        workout_type: workout_type.to_string(),
        distance_km: Some(6.0),
        duration_minutes: Some(35),
        intensity: Some("easy".to_string()),
        cycle_phase: None,
        phase_guidance: None,
    }
}

/// A planner response revising the given sessions to easy runs
pub fn easy_plan_for(sessions: &[TrainingSession]) -> GeneratedPlan {
    GeneratedPlan {
        sessions: sessions
            .iter()
            .map(|session| proposal(session.scheduled_date, "easy"))
            .collect(),
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryPlanStore>,
    pub clock: Arc<FixedClock>,
    pub plan: TrainingPlan,
    pub runner: RunnerProfile,
    pub race: Race,
}

impl Fixture {
    /// Active plan for a runner without cycle data
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_cycle(period_start: NaiveDate, cycle_length: i32) -> Self {
        Self::build(Some((period_start, cycle_length))).await
    }

    async fn build(cycle: Option<(NaiveDate, i32)>) -> Self {
        let store = Arc::new(InMemoryPlanStore::new());
        let clock = Arc::new(FixedClock::new(fixed_now()));

        let runner = RunnerProfile {
            id: Uuid::new_v4(),
            fitness_level: "intermediate".to_string(),
            weekly_mileage_km: Some(32.0),
            cycle_length_days: cycle.map(|(_, length)| length),
            last_period_start: cycle.map(|(start, _)| start),
            cycle_regularity: cycle.map(|_| "regular".to_string()),
        };
        let race = Race {
            id: Uuid::new_v4(),
            name: "Spring Half Marathon".to_string(),
            race_date: days_from_today(70),
            distance_km: 21.1,
            goal_time: Some("1:55:00".to_string()),
        };
        let plan = TrainingPlan::new(
            runner.id,
            race.id,
            "Half marathon build",
            days_from_today(-30),
            fixed_now() - Duration::days(30),
        );

        store.insert_runner(runner.clone()).await;
        store.insert_race(race.clone()).await;
        store.insert_plan(plan.clone()).await;

        Self {
            store,
            clock,
            plan,
            runner,
            race,
        }
    }

    pub fn plan_id(&self) -> Uuid {
        self.plan.id
    }

    pub async fn add_sessions(&self, sessions: Vec<TrainingSession>) {
        self.store.insert_sessions(sessions).await;
    }

    /// Overwrite the stored plan row
    pub async fn save_plan(&self, plan: TrainingPlan) {
        self.store.insert_plan(plan).await;
    }

    pub async fn stored_plan(&self) -> TrainingPlan {
        self.store.get_plan(self.plan.id).await.unwrap().unwrap()
    }

    pub async fn stored_sessions(&self) -> Vec<TrainingSession> {
        self.store.list_sessions(self.plan.id).await.unwrap()
    }

    pub fn adaptation_service(&self, planner: MockPlanner, jobs: Arc<dyn JobQueue>) -> PlanAdaptationService {
        self.adaptation_service_with_policy(planner, jobs, AdaptationPolicy::default())
    }

    pub fn adaptation_service_with_policy(
        &self,
        planner: MockPlanner,
        jobs: Arc<dyn JobQueue>,
        policy: AdaptationPolicy,
    ) -> PlanAdaptationService {
        PlanAdaptationService::new(
            self.store.clone(),
            Arc::new(planner),
            Arc::new(StandardCycleCalculator),
            jobs,
            self.clock.clone(),
            policy,
        )
    }

    /// Adaptation service reading and writing through `store`
    pub fn adaptation_service_over(
        &self,
        store: Arc<dyn PlanStore>,
        planner: MockPlanner,
        jobs: Arc<dyn JobQueue>,
    ) -> PlanAdaptationService {
        PlanAdaptationService::new(
            store,
            Arc::new(planner),
            Arc::new(StandardCycleCalculator),
            jobs,
            self.clock.clone(),
            AdaptationPolicy::default(),
        )
    }

    pub fn regeneration_service(&self, planner: MockPlanner) -> CycleRegenerationService {
        CycleRegenerationService::new(
            self.store.clone(),
            Arc::new(planner),
            Arc::new(StandardCycleCalculator),
            self.clock.clone(),
            AdaptationPolicy::default(),
        )
    }
}

/// Job queue double that must never be touched
pub fn idle_jobs() -> Arc<dyn JobQueue> {
    Arc::new(MockJobs::new())
}

/// Store wrapper that yields after every plan read, so concurrent callers
/// interleave, and fails commits while `fail_commits` is set.
pub struct FaultyStore {
    inner: Arc<InMemoryPlanStore>,
    fail_commits: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryPlanStore>) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlanStore for FaultyStore {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<TrainingPlan>, StoreError> {
        let plan = self.inner.get_plan(plan_id).await;
        tokio::task::yield_now().await;
        plan
    }

    async fn list_active_plans(&self) -> Result<Vec<TrainingPlan>, StoreError> {
        self.inner.list_active_plans().await
    }

    async fn get_runner(&self, runner_id: Uuid) -> Result<Option<RunnerProfile>, StoreError> {
        self.inner.get_runner(runner_id).await
    }

    async fn update_runner_cycle(
        &self,
        runner_id: Uuid,
        last_period_start: NaiveDate,
        cycle_length_days: i32,
    ) -> Result<(), StoreError> {
        self.inner
            .update_runner_cycle(runner_id, last_period_start, cycle_length_days)
            .await
    }

    async fn get_race(&self, race_id: Uuid) -> Result<Option<Race>, StoreError> {
        self.inner.get_race(race_id).await
    }

    async fn list_sessions(&self, plan_id: Uuid) -> Result<Vec<TrainingSession>, StoreError> {
        self.inner.list_sessions(plan_id).await
    }

    async fn list_history(&self, plan_id: Uuid) -> Result<Vec<PlanAdaptationHistory>, StoreError> {
        self.inner.list_history(plan_id).await
    }

    async fn mark_history_viewed(&self, history_id: Uuid, viewed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.inner.mark_history_viewed(history_id, viewed_at).await
    }

    async fn commit(&self, commit: PlanCommit) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.commit(commit).await
    }
}
