// Closed-loop wheel speed control for a four-wheel base
//
// The controller turns per-wheel target speeds (encoder ticks per control
// interval) into motor commands, using encoder feedback and an incremental
// PID with anti-windup. Hardware sits behind the traits in `motor`.

pub mod config;
pub mod control;
pub mod messages;
pub mod motor;
pub mod runtime;
