//! Glue between trigger events, the job queue and the engine.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::background_job_service::{
    BackgroundJobService, JobExecutor, JobQueue, JobType, ScheduledTask,
};
use crate::services::cycle_regeneration_service::CycleRegenerationService;
use crate::services::plan_adaptation_service::PlanAdaptationService;
use crate::store::PlanStore;

#[derive(Clone)]
pub struct AdaptationScheduler {
    store: Arc<dyn PlanStore>,
    jobs: Arc<dyn JobQueue>,
    adaptation: PlanAdaptationService,
    regeneration: CycleRegenerationService,
}

impl AdaptationScheduler {
    pub fn new(
        store: Arc<dyn PlanStore>,
        jobs: Arc<dyn JobQueue>,
        adaptation: PlanAdaptationService,
        regeneration: CycleRegenerationService,
    ) -> Self {
        Self {
            store,
            jobs,
            adaptation,
            regeneration,
        }
    }

    /// A session of the plan was completed or skipped
    pub async fn on_session_outcome(&self, plan_id: Uuid) -> Result<Uuid> {
        let job_id = self.jobs.enqueue(JobType::CheckPlanDrift { plan_id }).await?;
        Ok(job_id)
    }

    /// New authoritative cycle data arrived for the plan's runner. The data
    /// is saved first; a regeneration is queued when one is possible.
    pub async fn on_cycle_data_updated(
        &self,
        plan_id: Uuid,
        period_start: NaiveDate,
        cycle_length: i32,
    ) -> Result<Option<Uuid>> {
        if cycle_length <= 0 {
            return Err(anyhow!("Cycle length must be positive, got {}", cycle_length));
        }

        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| anyhow!("Plan {} not found", plan_id))?;
        self.store
            .update_runner_cycle(plan.runner_id, period_start, cycle_length)
            .await?;

        if !self.regeneration.can_regenerate(plan_id).await? {
            info!(%plan_id, "Cycle data saved; nothing to regenerate");
            return Ok(None);
        }

        let job_id = self
            .jobs
            .enqueue(JobType::RegenerateCycleWindow {
                plan_id,
                cycle_start: period_start,
                cycle_length,
            })
            .await?;
        Ok(Some(job_id))
    }

    /// Enqueue a drift check for every active plan
    pub async fn sweep_active_plans(&self) -> Result<usize> {
        let plans = self.store.list_active_plans().await?;
        let mut queued = 0;
        for plan in &plans {
            match self.jobs.enqueue(JobType::CheckPlanDrift { plan_id: plan.id }).await {
                Ok(_) => queued += 1,
                Err(e) => warn!(plan_id = %plan.id, "Failed to queue drift check: {}", e),
            }
        }
        info!(plans = plans.len(), queued, "Drift sweep queued");
        Ok(queued)
    }

    /// Register the periodic drift sweep on the background scheduler
    pub async fn start_drift_sweep(&self, jobs: &BackgroundJobService, cron: &str) -> Result<Uuid> {
        let scheduler = self.clone();
        let task: ScheduledTask = Arc::new(move || {
            let scheduler = scheduler.clone();
            Box::pin(async move {
                if let Err(e) = scheduler.sweep_active_plans().await {
                    error!("Drift sweep failed: {:#}", e);
                }
            })
        });

        jobs.schedule_recurring(cron, "drift-sweep", task).await
    }
}

#[async_trait]
impl JobExecutor for AdaptationScheduler {
    async fn execute(&self, job: &JobType) -> Result<()> {
        match job {
            JobType::CheckPlanDrift { plan_id } => {
                let triggered = self.adaptation.check_and_trigger(*plan_id).await;
                info!(%plan_id, triggered, "Drift check finished");
            }
            JobType::RecalculatePlan { plan_id } => {
                self.adaptation.recalculate(*plan_id).await?;
            }
            JobType::RegenerateCycleWindow {
                plan_id,
                cycle_start,
                cycle_length,
            } => {
                self.regeneration
                    .regenerate_window(*plan_id, *cycle_start, *cycle_length)
                    .await?;
            }
        }
        Ok(())
    }
}
