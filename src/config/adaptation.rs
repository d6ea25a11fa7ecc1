//! Policy constants for the plan adaptation engine.
//!
//! The lookback window and off-track threshold decide when a plan has
//! drifted; they are tunable per deployment and injectable in tests.

use super::env_or;

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationPolicy {
    /// Most recent completed/skipped sessions inspected for drift
    pub lookback_sessions: usize,
    /// Fewer qualifying sessions than this is insufficient signal
    pub min_qualifying_sessions: usize,
    /// Skipped-or-modified ratio at or above which a recalculation triggers
    pub off_track_threshold: f64,
    /// Number of upcoming sessions revised by a recalculation
    pub preview_window_sessions: usize,
    /// Days ahead covered by a cycle-triggered regeneration
    pub regeneration_window_days: i64,
    pub cooldown_enabled: bool,
    pub cooldown_days: i64,
    pub early_plan_exemption_enabled: bool,
    pub early_plan_exemption_days: i64,
}

impl Default for AdaptationPolicy {
    fn default() -> Self {
        Self {
            lookback_sessions: 7,
            min_qualifying_sessions: 3,
            off_track_threshold: 0.20,
            preview_window_sessions: 7,
            regeneration_window_days: 28,
            cooldown_enabled: false,
            cooldown_days: 3,
            early_plan_exemption_enabled: false,
            early_plan_exemption_days: 14,
        }
    }
}

impl AdaptationPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            lookback_sessions: env_or("ADAPT_LOOKBACK_SESSIONS", defaults.lookback_sessions),
            min_qualifying_sessions: env_or(
                "ADAPT_MIN_QUALIFYING_SESSIONS",
                defaults.min_qualifying_sessions,
            ),
            off_track_threshold: env_or("ADAPT_OFF_TRACK_THRESHOLD", defaults.off_track_threshold),
            preview_window_sessions: env_or(
                "ADAPT_PREVIEW_WINDOW_SESSIONS",
                defaults.preview_window_sessions,
            ),
            regeneration_window_days: env_or(
                "ADAPT_REGENERATION_WINDOW_DAYS",
                defaults.regeneration_window_days,
            ),
            cooldown_enabled: env_or("ADAPT_COOLDOWN_ENABLED", defaults.cooldown_enabled),
            cooldown_days: env_or("ADAPT_COOLDOWN_DAYS", defaults.cooldown_days),
            early_plan_exemption_enabled: env_or(
                "ADAPT_EARLY_PLAN_EXEMPTION_ENABLED",
                defaults.early_plan_exemption_enabled,
            ),
            early_plan_exemption_days: env_or(
                "ADAPT_EARLY_PLAN_EXEMPTION_DAYS",
                defaults.early_plan_exemption_days,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_from_env_matches_defaults_without_overrides() {
        env::remove_var("ADAPT_OFF_TRACK_THRESHOLD");
        env::remove_var("ADAPT_COOLDOWN_ENABLED");
        assert_eq!(AdaptationPolicy::from_env(), AdaptationPolicy::default());
    }

    #[test]
    #[serial]
    fn test_overrides_are_applied() {
        env::set_var("ADAPT_OFF_TRACK_THRESHOLD", "0.35");
        env::set_var("ADAPT_COOLDOWN_ENABLED", "true");
        let policy = AdaptationPolicy::from_env();
        env::remove_var("ADAPT_OFF_TRACK_THRESHOLD");
        env::remove_var("ADAPT_COOLDOWN_ENABLED");

        assert_eq!(policy.off_track_threshold, 0.35);
        assert!(policy.cooldown_enabled);
        assert_eq!(policy.lookback_sessions, 7);
    }
}
