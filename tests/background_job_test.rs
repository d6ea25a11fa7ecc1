use ai_coach_adaptive::services::{BackgroundJobService, JobExecutor, JobQueue, JobState, JobType};
use anyhow::{bail, Result};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Fails the first `failures` calls, then succeeds
struct FlakyExecutor {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyExecutor {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobExecutor for FlakyExecutor {
    async fn execute(&self, _job: &JobType) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            bail!("planner unavailable on attempt {}", call);
        }
        Ok(())
    }
}

fn service(max_retries: u32) -> Arc<BackgroundJobService> {
    Arc::new(BackgroundJobService::new(max_retries, Duration::from_millis(5)))
}

fn drift_check() -> JobType {
    JobType::CheckPlanDrift {
        plan_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_job_runs_to_success() {
    let jobs = service(3);
    let executor = FlakyExecutor::new(0);
    tokio::spawn(Arc::clone(&jobs).run_worker(executor.clone()));

    let job_id = jobs.enqueue(drift_check()).await.unwrap();
    let state = jobs.wait_for(job_id, Duration::from_secs(5)).await;

    assert_eq!(state, JobState::Succeeded);
    let job = jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.attempts, 1);
    assert!(job.completed_at.is_some());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_failed_attempts_are_retried() {
    let jobs = service(2);
    let executor = FlakyExecutor::new(2);
    tokio::spawn(Arc::clone(&jobs).run_worker(executor.clone()));

    let job_id = jobs.enqueue(drift_check()).await.unwrap();

    assert_eq!(jobs.wait_for(job_id, Duration::from_secs(5)).await, JobState::Succeeded);
    assert_eq!(jobs.get_job(job_id).await.unwrap().attempts, 3);
}

#[tokio::test]
async fn test_job_fails_after_exhausting_retries() {
    let jobs = service(1);
    let executor = FlakyExecutor::new(u32::MAX);
    tokio::spawn(Arc::clone(&jobs).run_worker(executor.clone()));

    let job_id = jobs.enqueue(drift_check()).await.unwrap();

    assert_eq!(jobs.wait_for(job_id, Duration::from_secs(5)).await, JobState::Failed);
    let job = jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.attempts, 2);
    assert!(job
        .error_message
        .unwrap()
        .contains("planner unavailable on attempt 2"));
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn test_queued_job_is_in_flight_until_a_worker_runs() {
    let jobs = service(0);
    let job_id = jobs.enqueue(drift_check()).await.unwrap();

    let state = jobs.get_state(job_id).await;
    assert_eq!(state, JobState::Enqueued);
    assert!(state.is_in_flight());
}

#[tokio::test]
async fn test_unknown_and_forgotten_jobs_report_unknown() {
    let jobs = service(0);
    assert_eq!(jobs.get_state(Uuid::new_v4()).await, JobState::Unknown);

    let executor = FlakyExecutor::new(0);
    tokio::spawn(Arc::clone(&jobs).run_worker(executor));
    let job_id = jobs.enqueue(drift_check()).await.unwrap();
    assert_eq!(jobs.wait_for(job_id, Duration::from_secs(5)).await, JobState::Succeeded);

    assert_eq!(jobs.cleanup_finished_jobs(chrono::Duration::zero()).await, 1);
    let state = jobs.get_state(job_id).await;
    assert_eq!(state, JobState::Unknown);
    assert!(!state.is_in_flight());
}

#[tokio::test]
async fn test_plan_jobs_are_listed_oldest_first() {
    let jobs = service(0);
    let plan_id = Uuid::new_v4();

    let first = jobs.enqueue(JobType::CheckPlanDrift { plan_id }).await.unwrap();
    let second = jobs.enqueue(JobType::RecalculatePlan { plan_id }).await.unwrap();
    jobs.enqueue(drift_check()).await.unwrap();

    let ids: Vec<Uuid> = jobs.get_plan_jobs(plan_id).await.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn test_only_one_worker_can_consume_the_queue() {
    let jobs = service(0);
    tokio::spawn(Arc::clone(&jobs).run_worker(FlakyExecutor::new(0)));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = Arc::clone(&jobs).run_worker(FlakyExecutor::new(0)).await;
    assert!(second.is_err());
}
