// Loop rate, watchdog, actuator limits and PID gains
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::control::Gains;

// Control loop frequency (one PID update per tick)
pub const LOOP_HZ: u64 = 30;

// Stop the base if no motor command arrives within this window
pub const AUTO_STOP_INTERVAL: Duration = Duration::from_millis(2000);

// Largest drive command the motor driver accepts (8-bit PWM)
pub const MAX_PWM: i64 = 255;

// Default gains, tuned for LOOP_HZ
pub const DEFAULT_KP: i32 = 20;
pub const DEFAULT_KD: i32 = 12;
pub const DEFAULT_KI: i32 = 0;
pub const DEFAULT_KO: i32 = 50;

/// Errors raised while loading or validating controller settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output scale Ko must be non-zero")]
    ZeroOutputScale,

    #[error("max_pwm must be positive, got {0}")]
    InvalidMaxPwm(i64),

    #[error("Loop rate must be between 1 and 1000 Hz, got {0}")]
    InvalidLoopRate(u64),
}

/// Runtime settings, every field optional in the JSON file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub kp: i32,
    pub kd: i32,
    pub ki: i32,
    pub ko: i32,
    pub max_pwm: i64,
    pub loop_hz: u64,
    pub auto_stop_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            kd: DEFAULT_KD,
            ki: DEFAULT_KI,
            ko: DEFAULT_KO,
            max_pwm: MAX_PWM,
            loop_hz: LOOP_HZ,
            auto_stop_ms: AUTO_STOP_INTERVAL.as_millis() as u64,
        }
    }
}

impl ControllerConfig {
    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        info!("Loaded controller config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gains()?;
        if self.max_pwm <= 0 {
            return Err(ConfigError::InvalidMaxPwm(self.max_pwm));
        }
        if !(1..=1000).contains(&self.loop_hz) {
            return Err(ConfigError::InvalidLoopRate(self.loop_hz));
        }
        Ok(())
    }

    pub fn gains(&self) -> Result<Gains, ConfigError> {
        Gains::new(self.kp, self.kd, self.ki, self.ko)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(1000 / self.loop_hz.max(1))
    }

    pub fn auto_stop(&self) -> Duration {
        Duration::from_millis(self.auto_stop_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.loop_period(), Duration::from_millis(33));
        assert_eq!(config.auto_stop(), AUTO_STOP_INTERVAL);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ControllerConfig::from_json(r#"{ "kp": 30, "ki": 2 }"#).unwrap();
        assert_eq!(config.kp, 30);
        assert_eq!(config.ki, 2);
        assert_eq!(config.kd, DEFAULT_KD);
        assert_eq!(config.max_pwm, MAX_PWM);
    }

    #[test]
    fn test_zero_output_scale_rejected() {
        let err = ControllerConfig::from_json(r#"{ "ko": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroOutputScale));
    }

    #[test]
    fn test_bad_limits_rejected() {
        assert!(matches!(
            ControllerConfig::from_json(r#"{ "max_pwm": 0 }"#),
            Err(ConfigError::InvalidMaxPwm(0))
        ));
        assert!(matches!(
            ControllerConfig::from_json(r#"{ "loop_hz": 0 }"#),
            Err(ConfigError::InvalidLoopRate(0))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ControllerConfig::from_json("{ kp: }"),
            Err(ConfigError::Json(_))
        ));
    }
}
