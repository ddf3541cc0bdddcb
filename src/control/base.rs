// Four-wheel speed controller
//
// Owns the per-wheel PID state, the shared gains and the motion flag,
// and talks to the hardware only through `EncoderSource` and
// `MotorActuator`. `update()` is meant to be called once per control
// interval from a single loop.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::pid::{Gains, StepOutcome, WheelControlState};
use crate::config::{ConfigError, ControllerConfig};
use crate::messages::{BaseTelemetry, WheelTelemetry};
use crate::motor::{EncoderSource, MotorActuator, Wheel, WheelCommands};

/// Where the controller sits in its stop/drive cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPhase {
    /// Not moving, state already reset
    Idle,
    /// Motion flag set, PID running every interval
    Active,
    /// Motion flag cleared, reset still owed on the next update
    PendingReset,
}

pub struct BaseController<E, M> {
    encoders: E,
    motors: M,
    wheels: [WheelControlState; 4],
    gains: Gains,
    max_pwm: i64,
    moving: bool,
}

impl<E, M> BaseController<E, M>
where
    E: EncoderSource,
    M: MotorActuator,
{
    /// Create a controller anchored at the current encoder readings
    pub fn new(encoders: E, motors: M, gains: Gains, max_pwm: i64) -> Self {
        let mut controller = Self {
            encoders,
            motors,
            wheels: Default::default(),
            gains,
            max_pwm: max_pwm.saturating_abs(),
            moving: false,
        };
        controller.reset();
        controller
    }

    pub fn from_config(
        encoders: E,
        motors: M,
        config: &ControllerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(encoders, motors, config.gains()?, config.max_pwm))
    }

    /// Re-anchor every wheel on its live encoder reading and clear the PID memory
    ///
    /// Targets are cleared too, so motion only resumes on a new command.
    pub fn reset(&mut self) {
        for wheel in Wheel::ALL {
            let count = self.encoders.read(wheel);
            self.wheels[wheel.index()].reset(count);
        }
        debug!("PID state reset");
    }

    /// Run one control interval
    ///
    /// Reads all encoders. While stopped this only performs the pending
    /// reset, if any, and leaves the motors alone. While moving it steps
    /// every wheel and sends the four outputs in one actuator call.
    pub fn update(&mut self) {
        for wheel in Wheel::ALL {
            let count = self.encoders.read(wheel);
            self.wheels[wheel.index()].record_encoder(count);
        }

        if !self.moving {
            // A non-zero speed history means we stopped since the last reset
            if self.wheels.iter().any(|w| !w.is_settled()) {
                self.reset();
            }
            return;
        }

        let (gains, max_pwm) = (self.gains, self.max_pwm);
        for (wheel, state) in Wheel::ALL.iter().zip(self.wheels.iter_mut()) {
            if state.step(&gains, max_pwm) == StepOutcome::Saturated {
                trace!("{:?} saturated at {}", wheel, state.output());
            }
        }

        let commands = self.outputs();
        trace!("Motor commands: {:?}", commands.as_array());
        self.motors.set_speeds(commands);
    }

    /// Last committed output of every wheel
    pub fn outputs(&self) -> WheelCommands {
        WheelCommands::from_array(self.wheels.each_ref().map(|w| w.output()))
    }

    /// Closed-loop speed command, ticks per interval for each wheel
    ///
    /// All-zero targets stop the motors and reset right away; anything
    /// else engages the controller.
    pub fn command_speeds(&mut self, targets: [f64; 4]) {
        if targets.iter().all(|&t| t == 0.0) {
            self.motors.set_speeds(WheelCommands::zero());
            self.reset();
            self.moving = false;
        } else {
            self.moving = true;
        }
        for (state, target) in self.wheels.iter_mut().zip(targets) {
            state.set_target(target);
        }
        debug!("Target speeds: {:?}, moving={}", targets, self.moving);
    }

    /// Drive the motors directly, bypassing the controller
    pub fn drive_open_loop(&mut self, commands: WheelCommands) {
        self.reset();
        self.moving = false;
        let commands = commands.clamped(self.max_pwm);
        debug!("Open-loop drive: {:?}", commands.as_array());
        self.motors.set_speeds(commands);
    }

    /// Zero the motors and drop out of closed-loop control
    ///
    /// PID memory is kept until the next `update()` resets it.
    pub fn stop(&mut self) {
        info!("Stopping all motors");
        self.motors.set_speeds(WheelCommands::zero());
        self.moving = false;
    }

    /// Zero the hardware counters and re-anchor the controller on them
    pub fn reset_encoders(&mut self) {
        info!("Resetting encoders");
        self.encoders.reset_counts();
        self.reset();
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// Swap gains between intervals
    pub fn set_gains(&mut self, gains: Gains) {
        info!(
            "PID gains: Kp={} Kd={} Ki={} Ko={}",
            gains.kp(),
            gains.kd(),
            gains.ki(),
            gains.ko()
        );
        self.gains = gains;
    }

    pub fn max_pwm(&self) -> i64 {
        self.max_pwm
    }

    pub fn set_target(&mut self, wheel: Wheel, ticks_per_interval: f64) {
        self.wheels[wheel.index()].set_target(ticks_per_interval);
    }

    pub fn target(&self, wheel: Wheel) -> f64 {
        self.wheels[wheel.index()].target()
    }

    pub fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn wheel(&self, wheel: Wheel) -> &WheelControlState {
        &self.wheels[wheel.index()]
    }

    pub fn phase(&self) -> ControlPhase {
        if self.moving {
            ControlPhase::Active
        } else if self.wheels.iter().any(|w| !w.is_settled()) {
            ControlPhase::PendingReset
        } else {
            ControlPhase::Idle
        }
    }

    pub fn telemetry(&self) -> BaseTelemetry {
        BaseTelemetry {
            phase: self.phase(),
            wheels: Wheel::ALL.map(|wheel| {
                let state = self.wheel(wheel);
                WheelTelemetry {
                    wheel,
                    target: state.target(),
                    measured_speed: state.measured_speed(),
                    output: state.output(),
                    integral_term: state.integral_term(),
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FixedEncoders {
        counts: [i64; 4],
        resets: usize,
    }

    impl EncoderSource for FixedEncoders {
        fn read(&mut self, wheel: Wheel) -> i64 {
            self.counts[wheel.index()]
        }

        fn reset_counts(&mut self) {
            self.counts = [0; 4];
            self.resets += 1;
        }
    }

    #[derive(Default)]
    struct LoggedMotors {
        sent: Vec<WheelCommands>,
    }

    impl MotorActuator for LoggedMotors {
        fn set_speeds(&mut self, commands: WheelCommands) {
            self.sent.push(commands);
        }
    }

    fn default_gains() -> Gains {
        Gains::new(20, 12, 0, 50).unwrap()
    }

    #[test]
    fn test_new_starts_idle_on_live_counts() {
        let mut enc = FixedEncoders {
            counts: [10, 20, 30, 40],
            ..Default::default()
        };
        let mut motors = LoggedMotors::default();
        let ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        assert_eq!(ctrl.phase(), ControlPhase::Idle);
        assert_eq!(ctrl.wheel(Wheel::LeftRear).encoder_count(), 30);
        assert_eq!(ctrl.wheel(Wheel::LeftRear).prev_encoder_count(), 30);
        drop(ctrl);
        assert!(motors.sent.is_empty());
    }

    #[test]
    fn test_idle_update_sends_nothing() {
        let mut enc = FixedEncoders::default();
        let mut motors = LoggedMotors::default();
        let mut ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        ctrl.set_target(Wheel::LeftFront, 10.0);
        ctrl.update();
        ctrl.update();
        assert_eq!(ctrl.phase(), ControlPhase::Idle);
        drop(ctrl);
        assert!(motors.sent.is_empty());
    }

    #[test]
    fn test_moving_update_dispatches_all_wheels() {
        let mut enc = FixedEncoders::default();
        let mut motors = LoggedMotors::default();
        let mut ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        ctrl.command_speeds([10.0, -10.0, 5.0, 0.0]);
        assert_eq!(ctrl.phase(), ControlPhase::Active);
        ctrl.update();
        drop(ctrl);
        assert_eq!(motors.sent, vec![WheelCommands::new(4, -4, 2, 0)]);
    }

    #[test]
    fn test_zero_speed_command_stops_and_resets() {
        let mut enc = FixedEncoders::default();
        let mut motors = LoggedMotors::default();
        let mut ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        ctrl.command_speeds([10.0; 4]);
        ctrl.update();
        ctrl.command_speeds([0.0; 4]);
        assert!(!ctrl.is_moving());
        assert_eq!(ctrl.outputs(), WheelCommands::zero());
        assert_eq!(ctrl.phase(), ControlPhase::Idle);
        drop(ctrl);
        assert_eq!(motors.sent.last(), Some(&WheelCommands::zero()));
    }

    #[test]
    fn test_open_loop_drive_is_clamped_and_disables_pid() {
        let mut enc = FixedEncoders::default();
        let mut motors = LoggedMotors::default();
        let mut ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        ctrl.command_speeds([10.0; 4]);
        ctrl.drive_open_loop(WheelCommands::new(100, 400, -400, 0));
        assert!(!ctrl.is_moving());
        ctrl.update();
        drop(ctrl);
        assert_eq!(motors.sent, vec![WheelCommands::new(100, 255, -255, 0)]);
    }

    #[test]
    fn test_reset_encoders_rebases_state() {
        let mut enc = FixedEncoders {
            counts: [500; 4],
            ..Default::default()
        };
        let mut motors = LoggedMotors::default();
        let mut ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        ctrl.reset_encoders();
        assert_eq!(ctrl.wheel(Wheel::RightRear).encoder_count(), 0);
        assert_eq!(ctrl.wheel(Wheel::RightRear).prev_encoder_count(), 0);
        drop(ctrl);
        assert_eq!(enc.resets, 1);
    }

    #[test]
    fn test_telemetry_reports_each_wheel() {
        let mut enc = FixedEncoders::default();
        let mut motors = LoggedMotors::default();
        let mut ctrl = BaseController::new(&mut enc, &mut motors, default_gains(), 255);
        ctrl.command_speeds([10.0, 0.0, 0.0, 0.0]);
        ctrl.update();
        let telemetry = ctrl.telemetry();
        assert_eq!(telemetry.phase, ControlPhase::Active);
        assert_eq!(telemetry.wheels[0].wheel, Wheel::LeftFront);
        assert_eq!(telemetry.wheels[0].output, 4);
        assert_eq!(telemetry.wheels[1].output, 0);
    }
}
