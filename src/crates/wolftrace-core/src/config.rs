//! Engine configuration.
//!
//! All scheduling knobs recognised by the blackboard controller and the
//! subscriber fan-out live here. Configuration is validated once at engine
//! construction; an invalid configuration refuses to start.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the blackboard engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of tasks the controller may enqueue per case across
    /// its lifetime. Bounds reactive chain depth.
    #[serde(default = "default_max_triggers")]
    pub max_triggers_per_case: u32,

    /// Cooldown applied to a knowledge source that does not declare its own,
    /// in seconds per (source, case) pair.
    #[serde(default = "default_cooldown")]
    pub default_cooldown_seconds: f64,

    /// Wall-time budget for a single knowledge-source invocation. On expiry
    /// the handler is cancelled and treated as failed.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: f64,

    /// Budget for delivering one stream message to one subscriber. A
    /// subscriber that exceeds it is dropped.
    #[serde(default = "default_fanout_timeout")]
    pub fanout_send_timeout_seconds: f64,

    /// Number of controller worker tasks draining the priority queue.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// When set, a case whose graph has been idle (no mutations) for at
    /// least this many seconds has its trigger count reset on the next
    /// mutation, allowing a long-lived case with sparse new reports to keep
    /// reacting. Unset preserves the never-reset behaviour.
    #[serde(default)]
    pub trigger_reset_idle_seconds: Option<f64>,
}

fn default_max_triggers() -> u32 {
    10
}

fn default_cooldown() -> f64 {
    2.0
}

fn default_handler_timeout() -> f64 {
    30.0
}

fn default_fanout_timeout() -> f64 {
    1.0
}

fn default_worker_concurrency() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_triggers_per_case: default_max_triggers(),
            default_cooldown_seconds: default_cooldown(),
            handler_timeout_seconds: default_handler_timeout(),
            fanout_send_timeout_seconds: default_fanout_timeout(),
            worker_concurrency: default_worker_concurrency(),
            trigger_reset_idle_seconds: None,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration, returning `CoreError::Configuration` on
    /// the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.max_triggers_per_case < 1 {
            return Err(CoreError::Configuration(
                "max_triggers_per_case must be >= 1".into(),
            ));
        }
        if !self.default_cooldown_seconds.is_finite() || self.default_cooldown_seconds < 0.0 {
            return Err(CoreError::Configuration(
                "default_cooldown_seconds must be a non-negative number".into(),
            ));
        }
        if !self.handler_timeout_seconds.is_finite() || self.handler_timeout_seconds < 0.0 {
            return Err(CoreError::Configuration(
                "handler_timeout_seconds must be a non-negative number".into(),
            ));
        }
        if !self.fanout_send_timeout_seconds.is_finite() || self.fanout_send_timeout_seconds <= 0.0
        {
            return Err(CoreError::Configuration(
                "fanout_send_timeout_seconds must be a positive number".into(),
            ));
        }
        if self.worker_concurrency < 1 {
            return Err(CoreError::Configuration(
                "worker_concurrency must be >= 1".into(),
            ));
        }
        if let Some(idle) = self.trigger_reset_idle_seconds {
            if !idle.is_finite() || idle <= 0.0 {
                return Err(CoreError::Configuration(
                    "trigger_reset_idle_seconds must be a positive number when set".into(),
                ));
            }
        }
        Ok(())
    }

    /// Default per-source cooldown as a `Duration`.
    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.default_cooldown_seconds)
    }

    /// Handler timeout as a `Duration`.
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.handler_timeout_seconds)
    }

    /// Fan-out send timeout as a `Duration`.
    pub fn fanout_send_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.fanout_send_timeout_seconds)
    }

    /// Idle interval after which a case's trigger count resets, if enabled.
    pub fn trigger_reset_idle(&self) -> Option<Duration> {
        self.trigger_reset_idle_seconds.map(Duration::from_secs_f64)
    }

    /// Set the anti-loop cap.
    pub fn with_max_triggers_per_case(mut self, cap: u32) -> Self {
        self.max_triggers_per_case = cap;
        self
    }

    /// Set the default cooldown in seconds.
    pub fn with_default_cooldown_seconds(mut self, secs: f64) -> Self {
        self.default_cooldown_seconds = secs;
        self
    }

    /// Set the handler timeout in seconds.
    pub fn with_handler_timeout_seconds(mut self, secs: f64) -> Self {
        self.handler_timeout_seconds = secs;
        self
    }

    /// Set the fan-out send timeout in seconds.
    pub fn with_fanout_send_timeout_seconds(mut self, secs: f64) -> Self {
        self.fanout_send_timeout_seconds = secs;
        self
    }

    /// Set the worker concurrency.
    pub fn with_worker_concurrency(mut self, workers: usize) -> Self {
        self.worker_concurrency = workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_triggers_per_case, 10);
        assert_eq!(config.worker_concurrency, 1);
        assert!(config.trigger_reset_idle_seconds.is_none());
    }

    #[test]
    fn test_zero_cap_rejected() {
        let config = EngineConfig::default().with_max_triggers_per_case(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let config = EngineConfig::default().with_default_cooldown_seconds(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_fanout_timeout_rejected() {
        let config = EngineConfig::default().with_fanout_send_timeout_seconds(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = EngineConfig::default().with_worker_concurrency(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_idle_reset_rejected() {
        let mut config = EngineConfig::default();
        config.trigger_reset_idle_seconds = Some(0.0);
        assert!(config.validate().is_err());
        config.trigger_reset_idle_seconds = Some(f64::NAN);
        assert!(config.validate().is_err());
        config.trigger_reset_idle_seconds = Some(300.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_triggers_per_case, 10);
        assert!((config.default_cooldown_seconds - 2.0).abs() < f64::EPSILON);
        assert!((config.handler_timeout_seconds - 30.0).abs() < f64::EPSILON);
    }
}
