use anyhow::Result;
use std::env;
use std::time::Duration;

use super::env_or;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
    /// Cron expression (with seconds) for the periodic drift sweep
    pub drift_sweep_cron: String,
    pub job_max_retries: u32,
    pub job_retry_backoff: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let drift_sweep_cron =
            env::var("DRIFT_SWEEP_CRON").unwrap_or_else(|_| "0 0 */6 * * *".to_string());
        let job_max_retries = env_or("JOB_MAX_RETRIES", 3);
        let job_retry_backoff_secs = env_or("JOB_RETRY_BACKOFF_SECS", 30);

        Ok(AppConfig {
            environment,
            log_level,
            drift_sweep_cron,
            job_max_retries,
            job_retry_backoff: Duration::from_secs(job_retry_backoff_secs),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_when_environment_is_empty() {
        for key in ["ENVIRONMENT", "LOG_LEVEL", "DRIFT_SWEEP_CRON", "JOB_MAX_RETRIES", "JOB_RETRY_BACKOFF_SECS"] {
            env::remove_var(key);
        }

        let config = AppConfig::from_env().unwrap();
        assert!(config.is_development());
        assert!(!config.is_production());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.drift_sweep_cron, "0 0 */6 * * *");
        assert_eq!(config.job_max_retries, 3);
        assert_eq!(config.job_retry_backoff, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_unparseable_retry_count_falls_back() {
        env::set_var("JOB_MAX_RETRIES", "lots");
        let config = AppConfig::from_env().unwrap();
        env::remove_var("JOB_MAX_RETRIES");

        assert_eq!(config.job_max_retries, 3);
    }
}
