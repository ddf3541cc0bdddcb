// Fixed-rate control loop with auto-stop watchdog
// Note: the watchdog zeroes the motors when the command layer goes quiet,
// so a crashed teleop cannot leave the robot driving on its last command

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::control::{BaseController, Gains};
use crate::messages::{BaseCommand, RuntimeHealth};
use crate::motor::{EncoderSource, MotorActuator};

pub struct Runtime<E, M> {
    controller: BaseController<E, M>,
    auto_stop: Duration,
    last_motor_cmd: Option<Instant>,
    // Motor command the watchdog already stopped the base for
    stopped_for: Option<Instant>,
    health: RuntimeHealth,
    ticks: u64,
}

impl<E, M> Runtime<E, M>
where
    E: EncoderSource,
    M: MotorActuator,
{
    pub fn new(controller: BaseController<E, M>, auto_stop: Duration) -> Self {
        Self {
            controller,
            auto_stop,
            last_motor_cmd: None,
            stopped_for: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
            ticks: 0,
        }
    }

    /// Apply an incoming command to the controller
    pub fn on_command(&mut self, cmd: BaseCommand, now: Instant) {
        debug!("Received command: {:?}", &cmd);
        if cmd.is_motor_command() {
            self.last_motor_cmd = Some(now);
        }

        match cmd {
            BaseCommand::Speeds { targets } => self.controller.command_speeds(targets),
            BaseCommand::RawPwm { commands } => self.controller.drive_open_loop(commands),
            BaseCommand::Gains { kp, kd, ki, ko } => match Gains::new(kp, kd, ki, ko) {
                Ok(gains) => self.controller.set_gains(gains),
                Err(e) => warn!("Rejected gains: {}", e),
            },
            BaseCommand::ResetEncoders => self.controller.reset_encoders(),
            BaseCommand::Stop => {
                self.controller.stop();
                self.last_motor_cmd = None;
                self.health = RuntimeHealth::CmdStale;
            }
        }
    }

    /// Stop the base once per motor command that goes stale
    fn check_watchdog(&mut self, now: Instant) {
        let Some(at) = self.last_motor_cmd else {
            // No motor command ever received
            self.health = RuntimeHealth::CmdStale;
            return;
        };
        let age = now.duration_since(at);

        if age <= self.auto_stop {
            self.health = RuntimeHealth::Ok;
        } else {
            // Watchdog triggered - stop the robot
            if self.stopped_for != Some(at) {
                warn!("Command stale ({:?} old), stopping robot", age);
                self.controller.stop();
                self.stopped_for = Some(at);
            }
            self.health = RuntimeHealth::CmdStale;
        }
    }

    /// One control interval: watchdog first, then the PID update
    pub fn tick(&mut self, now: Instant) -> RuntimeHealth {
        self.check_watchdog(now);
        self.controller.update();
        self.ticks += 1;
        self.health
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn controller(&self) -> &BaseController<E, M> {
        &self.controller
    }

}

/// Drive `runtime` at a fixed period until the command channel closes
///
/// Pending commands are drained before every update. When every sender
/// is dropped the motors are stopped and the loop returns.
pub async fn run<E, M>(
    runtime: &mut Runtime<E, M>,
    mut commands: mpsc::Receiver<BaseCommand>,
    period: Duration,
) where
    E: EncoderSource,
    M: MotorActuator,
{
    let mut tick = interval(period);
    // A late tick stretches the interval rather than bunching updates
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ticks_per_report = (1000 / period.as_millis().max(1)).max(1) as u64;

    info!(
        "Control loop started: {:?} period, {}ms auto-stop",
        period,
        runtime.auto_stop.as_millis()
    );

    loop {
        tick.tick().await;
        let now = tokio::time::Instant::now().into_std();

        // 1. Drain all pending commands (non-blocking)
        loop {
            match commands.try_recv() {
                Ok(cmd) => runtime.on_command(cmd, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Command channel closed, shutting down control loop");
                    runtime.controller.stop();
                    return;
                }
            }
        }

        // 2. Watchdog and PID update
        runtime.tick(now);

        // 3. Periodic telemetry
        if runtime.ticks % ticks_per_report == 0 {
            match serde_json::to_string(&runtime.controller.telemetry()) {
                Ok(json) => debug!(health = ?runtime.health, "{}", json),
                Err(e) => warn!("Failed to encode telemetry: {}", e),
            }
        }
    }
}
