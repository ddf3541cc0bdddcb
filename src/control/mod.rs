// Closed-loop wheel speed control
//
// - `pid`: per-wheel controller state and the incremental PID step
// - `base`: four-wheel controller context driving encoders and motors

mod base;
pub mod pid;

pub use base::{BaseController, ControlPhase};
pub use pid::{Gains, StepOutcome, WheelControlState};
