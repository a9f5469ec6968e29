//! Scheduler configuration.
//!
//! Loaded from JSON by the CLI. Durations are written in milliseconds:
//!
//! ```json
//! { "clock_hz": 3000000, "frame_hz": 60, "tick_interval_ms": 1 }
//! ```
//!
//! Missing fields take their default values.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Simulated clock rate in cycles per second.
pub const DEFAULT_CLOCK_HZ: u64 = 3_000_000;

/// VBlank rate in frames per second.
pub const DEFAULT_FRAME_HZ: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("clock_hz must be greater than zero")]
    ZeroClock,

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

/// Timing and channel parameters for the execution scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub clock_hz: u64,

    /// VBlank interrupts per second; 0 disables VBlank
    pub frame_hz: u64,

    /// Sleep between cooperative ticks while running
    #[serde(rename = "tick_interval_ms", with = "duration_ms")]
    pub tick_interval: Duration,

    /// Upper bound on the wall-clock time a single tick may catch up on
    #[serde(rename = "max_catch_up_ms", with = "duration_ms")]
    pub max_catch_up: Duration,

    pub command_capacity: usize,
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            frame_hz: DEFAULT_FRAME_HZ,
            tick_interval: Duration::from_millis(1),
            max_catch_up: Duration::from_millis(100),
            command_capacity: 64,
            event_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Parses and validates a JSON config.
    ///
    /// # Examples
    ///
    /// ```
    /// use vconsole::SchedulerConfig;
    ///
    /// let config = SchedulerConfig::from_json(r#"{ "clock_hz": 1000 }"#).unwrap();
    /// assert_eq!(config.clock_hz, 1000);
    /// assert_eq!(config.frame_hz, 60);
    /// assert!(SchedulerConfig::from_json(r#"{ "clock_hz": 0 }"#).is_err());
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_hz == 0 {
            return Err(ConfigError::ZeroClock);
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("command_capacity"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("event_capacity"));
        }
        Ok(())
    }

    /// Cycles between VBlank interrupts, or `None` if VBlank is disabled.
    pub fn cycles_per_frame(&self) -> Option<u64> {
        (self.frame_hz > 0).then(|| (self.clock_hz / self.frame_hz).max(1))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.clock_hz, 3_000_000);
        assert_eq!(config.cycles_per_frame(), Some(50_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_in_milliseconds() {
        let config =
            SchedulerConfig::from_json(r#"{ "tick_interval_ms": 5, "max_catch_up_ms": 250 }"#)
                .unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(5));
        assert_eq!(config.max_catch_up, Duration::from_millis(250));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["tick_interval_ms"], 5);
    }

    #[test]
    fn test_frame_hz_zero_disables_vblank() {
        let config = SchedulerConfig {
            frame_hz: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.cycles_per_frame(), None);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(matches!(
            SchedulerConfig::from_json(r#"{ "event_capacity": 0 }"#),
            Err(ConfigError::ZeroCapacity("event_capacity"))
        ));
        assert!(matches!(
            SchedulerConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
