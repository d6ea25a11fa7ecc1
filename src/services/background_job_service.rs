use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum JobType {
    RecalculatePlan {
        plan_id: Uuid,
    },
    CheckPlanDrift {
        plan_id: Uuid,
    },
    RegenerateCycleWindow {
        plan_id: Uuid,
        cycle_start: NaiveDate,
        cycle_length: i32,
    },
}

impl JobType {
    pub fn plan_id(&self) -> Uuid {
        match self {
            JobType::RecalculatePlan { plan_id }
            | JobType::CheckPlanDrift { plan_id }
            | JobType::RegenerateCycleWindow { plan_id, .. } => *plan_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    /// Queued or running: a plan with such a job must not start another cycle
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Enqueued | JobState::Processing)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub attempts: u32,
}

#[derive(Error, Debug)]
pub enum JobQueueError {
    #[error("Job queue is closed")]
    Closed,
}

/// Durable-queue capability the engine depends on
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: JobType) -> Result<Uuid, JobQueueError>;

    async fn get_state(&self, job_id: Uuid) -> JobState;
}

/// Runs a dequeued job; an error hands the job back to the retry policy
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &JobType) -> Result<()>;
}

pub type ScheduledTask = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct BackgroundJobService {
    scheduler: RwLock<Option<JobScheduler>>,
    jobs: Arc<RwLock<HashMap<Uuid, BackgroundJob>>>,
    sender: mpsc::UnboundedSender<Uuid>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Uuid>>>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl BackgroundJobService {
    pub fn new(max_retries: u32, retry_backoff: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            scheduler: RwLock::new(None),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            sender,
            receiver: Mutex::new(Some(receiver)),
            max_retries,
            retry_backoff,
        }
    }

    /// Start the cron scheduler and register the periodic job cleanup
    pub async fn start(&self) -> Result<()> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        *self.scheduler.write().await = Some(scheduler);
        info!("Background job scheduler started");

        self.add_cleanup_job().await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.write().await.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;
            info!("Background job scheduler stopped");
        }
        Ok(())
    }

    /// Register `task` to run on a cron schedule (six fields, seconds first)
    pub async fn schedule_recurring(&self, cron: &str, name: &str, task: ScheduledTask) -> Result<Uuid> {
        let job_name = name.to_string();
        let job = Job::new_async(cron, move |_uuid, _l| {
            debug!(job = %job_name, "Running scheduled task");
            task()
        })
        .map_err(|e| anyhow!("Failed to create scheduled job {}: {}", name, e))?;

        let guard = self.scheduler.read().await;
        let scheduler = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Job scheduler has not been started"))?;
        let id = scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add job {} to scheduler: {}", name, e))?;

        info!(job = %name, %cron, "Registered recurring job");
        Ok(id)
    }

    /// Consume the queue until the service is dropped. Each job runs on its
    /// own task so a retry backoff never blocks unrelated plans.
    pub async fn run_worker(self: Arc<Self>, executor: Arc<dyn JobExecutor>) -> Result<()> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("Job worker is already running"))?;

        info!("Background job worker started");
        while let Some(job_id) = receiver.recv().await {
            let service = Arc::clone(&self);
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                service.run_job(job_id, executor).await;
            });
        }
        info!("Background job worker stopped");
        Ok(())
    }

    pub async fn get_job(&self, job_id: Uuid) -> Option<BackgroundJob> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    pub async fn get_plan_jobs(&self, plan_id: Uuid) -> Vec<BackgroundJob> {
        let jobs = self.jobs.read().await;
        let mut plan_jobs: Vec<BackgroundJob> = jobs
            .values()
            .filter(|job| job.job_type.plan_id() == plan_id)
            .cloned()
            .collect();
        plan_jobs.sort_by_key(|job| job.created_at);
        plan_jobs
    }

    /// Poll until the job finishes or `timeout` elapses; returns the last observed state
    pub async fn wait_for(&self, job_id: Uuid, timeout: Duration) -> JobState {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.get_state(job_id).await;
            if state.is_finished() || state == JobState::Unknown || tokio::time::Instant::now() >= deadline {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn run_job(&self, job_id: Uuid, executor: Arc<dyn JobExecutor>) {
        let Some(job_type) = self.get_job(job_id).await.map(|job| job.job_type) else {
            warn!(%job_id, "Dequeued unknown job");
            return;
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.update_job_state(job_id, JobState::Processing, None).await;
            info!(%job_id, ?job_type, attempt, "Starting background job");

            match executor.execute(&job_type).await {
                Ok(()) => {
                    self.update_job_state(job_id, JobState::Succeeded, None).await;
                    info!(%job_id, "Completed background job");
                    return;
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(%job_id, attempt, "Background job failed, retrying: {:#}", e);
                    self.update_job_state(job_id, JobState::Enqueued, Some(format!("{:#}", e))).await;
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => {
                    let error_msg = format!("{:#}", e);
                    self.update_job_state(job_id, JobState::Failed, Some(error_msg.clone())).await;
                    error!(%job_id, attempts = attempt, "Background job failed: {}", error_msg);
                    return;
                }
            }
        }
    }

    async fn update_job_state(&self, job_id: Uuid, state: JobState, error_message: Option<String>) {
        let mut jobs = self.jobs.write().await;

        if let Some(job) = jobs.get_mut(&job_id) {
            job.state = state;
            if error_message.is_some() {
                job.error_message = error_message;
            }

            match state {
                JobState::Processing => {
                    job.attempts += 1;
                    job.started_at.get_or_insert_with(Utc::now);
                }
                JobState::Succeeded | JobState::Failed => {
                    job.completed_at = Some(Utc::now());
                }
                _ => {}
            }
        }
    }

    /// Forget finished jobs older than `older_than`; their ids then report `Unknown`
    pub async fn cleanup_finished_jobs(&self, older_than: chrono::Duration) -> usize {
        Self::cleanup_jobs(&self.jobs, older_than).await
    }

    async fn cleanup_jobs(jobs_ref: &Arc<RwLock<HashMap<Uuid, BackgroundJob>>>, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = jobs_ref.write().await;
        let initial_count = jobs.len();

        jobs.retain(|_, job| !job.state.is_finished() || job.created_at > cutoff);

        let cleaned_count = initial_count - jobs.len();
        if cleaned_count > 0 {
            info!("Cleaned up {} finished jobs", cleaned_count);
        }
        cleaned_count
    }

    async fn add_cleanup_job(&self) -> Result<()> {
        let jobs_ref = Arc::clone(&self.jobs);

        // Daily at 2 AM
        let task: ScheduledTask = Arc::new(move || {
            let jobs_ref = Arc::clone(&jobs_ref);
            Box::pin(async move {
                Self::cleanup_jobs(&jobs_ref, chrono::Duration::days(7)).await;
            })
        });

        self.schedule_recurring("0 0 2 * * *", "job-cleanup", task).await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for BackgroundJobService {
    async fn enqueue(&self, job_type: JobType) -> Result<Uuid, JobQueueError> {
        let job_id = Uuid::new_v4();
        let job = BackgroundJob {
            id: job_id,
            job_type: job_type.clone(),
            state: JobState::Enqueued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            attempts: 0,
        };

        self.jobs.write().await.insert(job_id, job);

        if self.sender.send(job_id).is_err() {
            self.jobs.write().await.remove(&job_id);
            return Err(JobQueueError::Closed);
        }

        info!(%job_id, ?job_type, "Queued background job");
        Ok(job_id)
    }

    async fn get_state(&self, job_id: Uuid) -> JobState {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|job| job.state)
            .unwrap_or(JobState::Unknown)
    }
}
