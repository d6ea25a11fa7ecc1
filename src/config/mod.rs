// Configuration loaded from the process environment

pub mod adaptation;
pub mod app;
pub mod database;
pub mod planner;

pub use adaptation::AdaptationPolicy;
pub use app::AppConfig;
pub use database::{run_migrations, DatabaseConfig};
pub use planner::PlannerConfig;

/// Read an environment variable and parse it, falling back to `default` when
/// the variable is missing or does not parse.
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
