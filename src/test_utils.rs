//! Test utilities for coursetimers
//!
//! Fixtures for runtime tests: a fixed start instant, a runtime wired to a
//! scripted gateway and a manual clock, and assertion helpers.

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::gateway::fake::ScriptedGateway;
use crate::runtime::{RuntimeSettings, TimerRuntime};
use crate::storage::LocalState;

/// Fixed instant all fixtures start from: 2025-03-10 08:00:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

/// A runtime with every collaborator exposed for scripting
pub struct Harness {
    /// Clock driving both the runtime and the scripted server
    pub clock: Arc<ManualClock>,
    /// In-process backend
    pub gateway: Arc<ScriptedGateway>,
    /// Local state the runtime persists into
    pub local: LocalState,
    /// Runtime under test
    pub runtime: TimerRuntime,
}

impl Harness {
    /// Harness over fresh in-memory state
    pub fn new() -> Self {
        Self::with_settings(RuntimeSettings::default())
    }

    /// Harness over fresh in-memory state with custom settings
    pub fn with_settings(settings: RuntimeSettings) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let gateway = Arc::new(ScriptedGateway::new(clock.clone()));
        Self::assemble(clock, gateway, LocalState::in_memory(), settings)
    }

    /// Build a second runtime over the same clock, server and local state,
    /// as a restarted process would
    pub fn restart(&self) -> Self {
        Self::assemble(
            self.clock.clone(),
            self.gateway.clone(),
            self.local.clone(),
            self.runtime.settings().clone(),
        )
    }

    fn assemble(
        clock: Arc<ManualClock>,
        gateway: Arc<ScriptedGateway>,
        local: LocalState,
        settings: RuntimeSettings,
    ) -> Self {
        let runtime = TimerRuntime::new(gateway.clone(), local.clone(), clock.clone(), settings);
        Self {
            clock,
            gateway,
            local,
            runtime,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T, E: Display>(result: Result<T, E>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// A complete configuration file
pub fn test_config_yaml() -> String {
    r#"
api:
  base_url: http://localhost:8000/api
  timeout_seconds: 5
runtime:
  tick_interval_ms: 250
  refresh_interval_seconds: 5
  time_zone: Europe/Paris
storage:
  namespace: test
logging:
  level: debug
  json_format: false
username: tester
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::CourseTimersError;

    #[test]
    fn test_harness_starts_idle_at_t0() {
        let h = Harness::new();
        assert!(h.runtime.state().timer_id().is_none());
        assert_eq!(crate::clock::Clock::now(h.clock.as_ref()), t0());
    }

    #[tokio::test]
    async fn test_restart_shares_local_state() {
        let h = Harness::new();
        h.runtime.adjust_offset("math", 42);
        let restarted = h.restart();
        assert_eq!(restarted.runtime.offset("math"), 42);
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<(), CourseTimersError> =
            Err(CourseTimersError::Config("test error message".to_string()));
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<(), CourseTimersError> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: Result<(), CourseTimersError> =
            Err(CourseTimersError::Config("different error".to_string()));
        assert_error_contains(result, "not present");
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.runtime_settings().time_zone, "Europe/Paris");
    }
}
