use ai_coach_adaptive::config::{run_migrations, AdaptationPolicy, AppConfig, DatabaseConfig, PlannerConfig};
use ai_coach_adaptive::services::{
    AdaptationScheduler, BackgroundJobService, CycleRegenerationService, HttpPlanGenerator, PlanAdaptationService,
    StandardCycleCalculator, SystemClock,
};
use ai_coach_adaptive::store::PgPlanStore;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&app_config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;
    info!("Database ready");

    let policy = AdaptationPolicy::from_env();
    let store = Arc::new(PgPlanStore::new(pool));
    let generator = Arc::new(HttpPlanGenerator::new(&PlannerConfig::from_env()?)?);
    let oracle = Arc::new(StandardCycleCalculator);
    let clock = Arc::new(SystemClock);
    let jobs = Arc::new(BackgroundJobService::new(
        app_config.job_max_retries,
        app_config.job_retry_backoff,
    ));

    let adaptation = PlanAdaptationService::new(
        store.clone(),
        generator.clone(),
        oracle.clone(),
        jobs.clone(),
        clock.clone(),
        policy.clone(),
    );
    let regeneration = CycleRegenerationService::new(store.clone(), generator, oracle, clock, policy);
    let scheduler = AdaptationScheduler::new(store, jobs.clone(), adaptation, regeneration);

    jobs.start().await?;
    scheduler
        .start_drift_sweep(&jobs, &app_config.drift_sweep_cron)
        .await?;

    let worker = tokio::spawn(Arc::clone(&jobs).run_worker(Arc::new(scheduler)));
    info!(environment = %app_config.environment, "Plan adaptation worker running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    jobs.stop().await?;
    worker.abort();
    if let Err(e) = worker.await {
        if !e.is_cancelled() {
            error!("Job worker terminated abnormally: {}", e);
        }
    }

    Ok(())
}
