// Runs the speed controller against the simulated base
//
// Usage: cargo run -- --target 10,10,-10,-10 --duration 5 --load 1.5
// Set RUST_LOG=debug to see per-second telemetry.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wheel_pid_runtime::config::ControllerConfig;
use wheel_pid_runtime::control::BaseController;
use wheel_pid_runtime::messages::BaseCommand;
use wheel_pid_runtime::motor::{SimulatedBase, Wheel};
use wheel_pid_runtime::runtime::{self, Runtime};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(version, about = "Four-wheel PID speed controller on a simulated base")]
struct Args {
    /// JSON file with gains and loop settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the control loop rate
    #[arg(long)]
    hz: Option<u64>,

    /// Seconds to drive before commanding a stop
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Target speeds in ticks per interval: left_front,right_front,left_rear,right_rear
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_values_t = [10.0, 10.0, 10.0, 10.0]
    )]
    target: Vec<f64>,

    /// Friction load on every simulated wheel, in ticks per interval
    #[arg(long, default_value_t = 1.0)]
    load: f64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = simulate(Args::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn simulate(args: Args) -> Result<(), BoxError> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(hz) = args.hz {
        config.loop_hz = hz;
    }
    config.validate()?;

    let targets: [f64; 4] = args
        .target
        .as_slice()
        .try_into()
        .map_err(|_| format!("expected 4 target speeds, got {}", args.target.len()))?;
    let drive_for = Duration::try_from_secs_f64(args.duration)?;
    let period = config.loop_period();

    let base = SimulatedBase::new(args.load);
    let controller = BaseController::from_config(base.encoders(), base.motors(), &config)?;
    let mut rt = Runtime::new(controller, config.auto_stop());

    // Plant physics runs on its own clock, like real motors would
    let plant = base.clone();
    let physics = tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            plant.advance();
        }
    });

    // Command layer: keep the watchdog fed, then stop
    let (tx, rx) = mpsc::channel(16);
    let keepalive = config.auto_stop() / 2;
    tokio::spawn(async move {
        let started = Instant::now();
        while started.elapsed() < drive_for {
            if tx.send(BaseCommand::Speeds { targets }).await.is_err() {
                return;
            }
            sleep(keepalive.min(drive_for.saturating_sub(started.elapsed()))).await;
        }
        let _ = tx.send(BaseCommand::Speeds { targets: [0.0; 4] }).await;
    });

    info!(
        "Driving simulated base at {:?} ticks/interval for {:?}",
        targets, drive_for
    );
    runtime::run(&mut rt, rx, period).await;
    physics.abort();

    for wheel in Wheel::ALL {
        info!(
            "{:?}: final speed {:.2} ticks/interval, motor {}",
            wheel,
            base.speed(wheel),
            base.applied().get(wheel)
        );
    }
    info!(
        "{} control intervals, {} motor updates",
        rt.ticks(),
        base.actuator_updates()
    );
    info!("Final state: {}", serde_json::to_string(&rt.controller().telemetry())?);
    Ok(())
}
