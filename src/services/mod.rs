// Plan adaptation engine services

pub mod adaptation_scheduler;
pub mod background_job_service;
pub mod clock;
pub mod cycle_phase_service;
pub mod cycle_regeneration_service;
pub mod drift_detection;
pub mod plan_adaptation_service;
pub mod plan_generator;
pub mod recalculation_context;
pub mod session_apply;

pub use adaptation_scheduler::AdaptationScheduler;
pub use background_job_service::{BackgroundJob, BackgroundJobService, JobExecutor, JobQueue, JobQueueError, JobState, JobType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use cycle_phase_service::{CyclePhaseOracle, StandardCycleCalculator};
pub use cycle_regeneration_service::CycleRegenerationService;
pub use drift_detection::{assess_drift, DriftAssessment, DriftVerdict};
pub use plan_adaptation_service::{PlanAdaptationService, PlanSummary, DEFAULT_SUMMARY};
pub use plan_generator::{AiPlanGenerator, HttpPlanGenerator, PlanGeneratorError};
pub use session_apply::SessionArena;
