// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::control::ControlPhase;
use crate::motor::{Wheel, WheelCommands};

// Command from the command layer -> runtime
// Tagged by `cmd`, e.g. {"cmd":"speeds","targets":[10,10,10,10]}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BaseCommand {
    /// Target speeds in ticks per interval: [left_front, right_front, left_rear, right_rear]
    Speeds { targets: [f64; 4] },
    /// Open-loop PWM, PID disabled until the next speed command
    RawPwm { commands: WheelCommands },
    /// Replace the PID gains
    Gains { kp: i32, kd: i32, ki: i32, ko: i32 },
    ResetEncoders,
    Stop,
}

impl BaseCommand {
    /// Whether this command feeds the auto-stop watchdog
    pub fn is_motor_command(&self) -> bool {
        matches!(self, BaseCommand::Speeds { .. } | BaseCommand::RawPwm { .. })
    }
}

/// Snapshot of one wheel's controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelTelemetry {
    pub wheel: Wheel,
    pub target: f64,
    pub measured_speed: i32,
    pub output: i64,
    pub integral_term: i32,
}

/// Snapshot of the whole base, published by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTelemetry {
    pub phase: ControlPhase,
    pub wheels: [WheelTelemetry; 4],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speed_command() {
        let cmd: BaseCommand =
            serde_json::from_str(r#"{"cmd":"speeds","targets":[10,10,-5,0.5]}"#).unwrap();
        assert_eq!(
            cmd,
            BaseCommand::Speeds {
                targets: [10.0, 10.0, -5.0, 0.5]
            }
        );
        assert!(cmd.is_motor_command());
    }

    #[test]
    fn test_parse_raw_pwm_and_gains() {
        let cmd: BaseCommand = serde_json::from_str(
            r#"{"cmd":"raw_pwm","commands":{"left_front":100,"right_front":-100,"left_rear":0,"right_rear":50}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            BaseCommand::RawPwm {
                commands: WheelCommands::new(100, -100, 0, 50)
            }
        );

        let cmd: BaseCommand =
            serde_json::from_str(r#"{"cmd":"gains","kp":20,"kd":12,"ki":0,"ko":50}"#).unwrap();
        assert!(!cmd.is_motor_command());
    }

    #[test]
    fn test_health_serialization() {
        assert_eq!(
            serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(),
            "\"cmd_stale\""
        );
    }
}
