// Simulated four-wheel base
//
// Each wheel is a first-order DC motor: its speed approaches
// `gain * pwm` minus a friction load, and the encoder integrates
// that speed. One `advance()` call is one control interval.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{EncoderSource, MotorActuator, Wheel, WheelCommands};

/// Steady-state speed per PWM unit, in ticks per interval
pub const DEFAULT_GAIN: f64 = 0.2;

/// Fraction of the speed gap closed each interval
pub const DEFAULT_RESPONSE: f64 = 0.35;

#[derive(Debug, Clone, Copy)]
struct SimWheel {
    pwm: i64,
    speed: f64,
    position: f64,
    load: f64,
}

impl SimWheel {
    fn new(load: f64) -> Self {
        Self {
            pwm: 0,
            speed: 0.0,
            position: 0.0,
            load,
        }
    }

    fn advance(&mut self, gain: f64, response: f64) {
        let drive = gain * self.pwm as f64;
        // Friction eats the first `load` ticks/interval of drive
        let steady = if drive.abs() <= self.load {
            0.0
        } else {
            drive - self.load * drive.signum()
        };
        self.speed += response * (steady - self.speed);
        self.position += self.speed;
    }

    fn count(&self) -> i64 {
        self.position.round() as i64
    }
}

#[derive(Debug)]
struct Plant {
    wheels: [SimWheel; 4],
    gain: f64,
    response: f64,
    updates: u64,
}

/// Shared handle to the simulated base
///
/// Hand out `encoders()` and `motors()` to the controller and keep
/// this handle to step the physics.
#[derive(Debug, Clone)]
pub struct SimulatedBase {
    plant: Arc<Mutex<Plant>>,
}

impl SimulatedBase {
    /// Create a base with the same friction load on every wheel
    pub fn new(load: f64) -> Self {
        Self::with_loads([load; 4])
    }

    pub fn with_loads(loads: [f64; 4]) -> Self {
        Self::with_params(loads, DEFAULT_GAIN, DEFAULT_RESPONSE)
    }

    pub fn with_params(loads: [f64; 4], gain: f64, response: f64) -> Self {
        let plant = Plant {
            wheels: loads.map(SimWheel::new),
            gain,
            response: response.clamp(0.0, 1.0),
            updates: 0,
        };
        Self {
            plant: Arc::new(Mutex::new(plant)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Plant> {
        self.plant.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn encoders(&self) -> SimEncoders {
        SimEncoders { base: self.clone() }
    }

    pub fn motors(&self) -> SimMotors {
        SimMotors { base: self.clone() }
    }

    /// Step the physics by one control interval
    pub fn advance(&self) {
        let mut plant = self.lock();
        let (gain, response) = (plant.gain, plant.response);
        for wheel in plant.wheels.iter_mut() {
            wheel.advance(gain, response);
        }
    }

    /// Change the friction load of one wheel (e.g. the robot hits carpet)
    pub fn set_load(&self, wheel: Wheel, load: f64) {
        self.lock().wheels[wheel.index()].load = load;
    }

    /// Commands most recently applied by the controller
    pub fn applied(&self) -> WheelCommands {
        WheelCommands::from_array(self.lock().wheels.map(|w| w.pwm))
    }

    /// Number of `set_speeds` calls received so far
    pub fn actuator_updates(&self) -> u64 {
        self.lock().updates
    }

    /// Current wheel speed in ticks per interval
    pub fn speed(&self, wheel: Wheel) -> f64 {
        self.lock().wheels[wheel.index()].speed
    }
}

/// Encoder view of a [`SimulatedBase`]
#[derive(Debug, Clone)]
pub struct SimEncoders {
    base: SimulatedBase,
}

impl EncoderSource for SimEncoders {
    fn read(&mut self, wheel: Wheel) -> i64 {
        self.base.lock().wheels[wheel.index()].count()
    }

    fn reset_counts(&mut self) {
        for wheel in self.base.lock().wheels.iter_mut() {
            wheel.position = 0.0;
        }
    }
}

/// Motor driver view of a [`SimulatedBase`]
#[derive(Debug, Clone)]
pub struct SimMotors {
    base: SimulatedBase,
}

impl MotorActuator for SimMotors {
    fn set_speeds(&mut self, commands: WheelCommands) {
        trace!("Sim motors <- {:?}", commands.as_array());
        let mut plant = self.base.lock();
        for (wheel, pwm) in plant.wheels.iter_mut().zip(commands.as_array()) {
            wheel.pwm = pwm;
        }
        plant.updates += 1;
    }
}
