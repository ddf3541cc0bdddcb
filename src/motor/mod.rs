// Hardware-facing capabilities consumed by the speed controller
//
// Provides:
// - Wheel identifiers for the four-wheel base
// - Encoder and actuator traits, implemented once per hardware variant
// - A simulated base for running the loop without hardware

pub mod sim;

use serde::{Deserialize, Serialize};

pub use sim::{SimEncoders, SimMotors, SimulatedBase};

/// Wheel positions on the base, in command order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    LeftFront,
    RightFront,
    LeftRear,
    RightRear,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::LeftFront,
        Wheel::RightFront,
        Wheel::LeftRear,
        Wheel::RightRear,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Signed drive commands for the four motors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelCommands {
    pub left_front: i64,
    pub right_front: i64,
    pub left_rear: i64,
    pub right_rear: i64,
}

impl WheelCommands {
    pub fn new(left_front: i64, right_front: i64, left_rear: i64, right_rear: i64) -> Self {
        Self {
            left_front,
            right_front,
            left_rear,
            right_rear,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(values: [i64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Returns commands as array [left_front, right_front, left_rear, right_rear]
    pub fn as_array(&self) -> [i64; 4] {
        [
            self.left_front,
            self.right_front,
            self.left_rear,
            self.right_rear,
        ]
    }

    pub fn get(&self, wheel: Wheel) -> i64 {
        self.as_array()[wheel.index()]
    }

    /// Limit every command to `[-max, max]`
    pub fn clamped(&self, max: i64) -> Self {
        Self::from_array(self.as_array().map(|v| v.clamp(-max, max)))
    }
}

/// Absolute tick counters, one per wheel
pub trait EncoderSource {
    /// Current absolute tick count of `wheel`
    fn read(&mut self, wheel: Wheel) -> i64;

    /// Zero the hardware counters of all wheels
    fn reset_counts(&mut self);
}

/// Motor driver accepting one signed command per wheel
pub trait MotorActuator {
    /// Apply all four commands as a single operation
    fn set_speeds(&mut self, commands: WheelCommands);
}

impl<T: EncoderSource + ?Sized> EncoderSource for &mut T {
    fn read(&mut self, wheel: Wheel) -> i64 {
        (**self).read(wheel)
    }

    fn reset_counts(&mut self) {
        (**self).reset_counts()
    }
}

impl<T: MotorActuator + ?Sized> MotorActuator for &mut T {
    fn set_speeds(&mut self, commands: WheelCommands) {
        (**self).set_speeds(commands)
    }
}
