use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

use super::env_or;

/// Connection settings for the external AI planner service
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("PLANNER_API_URL")
            .unwrap_or_else(|_| "http://localhost:8090".to_string());
        let api_key = env::var("PLANNER_API_KEY")
            .map_err(|_| anyhow!("PLANNER_API_KEY must be set"))?;
        let timeout_secs = env_or("PLANNER_TIMEOUT_SECS", 60);

        Ok(PlannerConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
