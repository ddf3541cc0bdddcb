// Incremental PID step for a single wheel
//
// Integer arithmetic throughout: speeds in encoder ticks per control
// interval, outputs in actuator (PWM) units. The derivative acts on the
// measured speed and the integral is kept in output units, so neither a
// target step nor a gain change kicks the output.

use crate::config::ConfigError;

/// PID gains shared by every wheel
///
/// The controller output is `(kp*e - kd*dm + iterm) / ko`, so `ko` scales
/// all three terms down and must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gains {
    kp: i32,
    kd: i32,
    ki: i32,
    ko: i32,
}

impl Gains {
    pub fn new(kp: i32, kd: i32, ki: i32, ko: i32) -> Result<Self, ConfigError> {
        if ko == 0 {
            return Err(ConfigError::ZeroOutputScale);
        }
        Ok(Self { kp, kd, ki, ko })
    }

    pub fn kp(&self) -> i32 {
        self.kp
    }

    pub fn kd(&self) -> i32 {
        self.kd
    }

    pub fn ki(&self) -> i32 {
        self.ki
    }

    pub fn ko(&self) -> i32 {
        self.ko
    }
}

/// Result of one controller step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Output inside the actuator range, integral updated
    Tracking,
    /// Output clamped to the actuator limit, integral frozen
    Saturated,
}

/// Controller memory for one wheel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WheelControlState {
    /// Desired speed in ticks per interval
    target: f64,
    encoder_count: i64,
    prev_encoder_count: i64,
    prev_measured_speed: i32,
    integral_term: i32,
    output: i64,
}

impl WheelControlState {
    /// Fresh state anchored at `encoder`, as after a reset
    pub fn new(encoder: i64) -> Self {
        let mut state = Self::default();
        state.reset(encoder);
        state
    }

    /// Zero the controller memory and re-anchor both encoder snapshots
    pub fn reset(&mut self, encoder: i64) {
        self.target = 0.0;
        self.encoder_count = encoder;
        self.prev_encoder_count = encoder;
        self.output = 0;
        self.prev_measured_speed = 0;
        self.integral_term = 0;
    }

    /// Store the latest encoder reading, ahead of `step`
    pub fn record_encoder(&mut self, encoder: i64) {
        self.encoder_count = encoder;
    }

    /// Advance the controller by one interval
    ///
    /// The new output is an increment on top of the previous one. When the
    /// result hits `±max_pwm` it is clamped and the integral is left alone.
    pub fn step(&mut self, gains: &Gains, max_pwm: i64) -> StepOutcome {
        // Wrapping difference then truncation keeps counter rollover harmless
        let measured = self.encoder_count.wrapping_sub(self.prev_encoder_count) as i32;
        let error = (self.target - f64::from(measured)) as i64;
        let delta_measured = i64::from(measured) - i64::from(self.prev_measured_speed);

        let numerator = i64::from(gains.kp)
            .saturating_mul(error)
            .saturating_sub(i64::from(gains.kd).saturating_mul(delta_measured))
            .saturating_add(i64::from(self.integral_term));
        let mut output = numerator.saturating_div(i64::from(gains.ko));
        self.prev_encoder_count = self.encoder_count;

        output = output.saturating_add(self.output);

        let outcome = if output >= max_pwm {
            output = max_pwm;
            StepOutcome::Saturated
        } else if output <= -max_pwm {
            output = -max_pwm;
            StepOutcome::Saturated
        } else {
            let integral = i64::from(self.integral_term)
                .saturating_add(i64::from(gains.ki).saturating_mul(error));
            self.integral_term = integral.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
            StepOutcome::Tracking
        };

        self.output = output;
        self.prev_measured_speed = measured;
        outcome
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, ticks_per_interval: f64) {
        self.target = ticks_per_interval;
    }

    pub fn encoder_count(&self) -> i64 {
        self.encoder_count
    }

    pub fn prev_encoder_count(&self) -> i64 {
        self.prev_encoder_count
    }

    /// Speed measured during the last stepped interval
    pub fn measured_speed(&self) -> i32 {
        self.prev_measured_speed
    }

    pub fn integral_term(&self) -> i32 {
        self.integral_term
    }

    /// Last committed drive command
    pub fn output(&self) -> i64 {
        self.output
    }

    /// True once a reset has cleared the speed history
    pub fn is_settled(&self) -> bool {
        self.prev_measured_speed == 0
    }
}
