//! # Keyloader Control
//!
//! Operator CLI for the two-axis keyloader rig: rotary indexing table
//! plus linear key slider.
//!
//! Runs one command per invocation against either the real GPIO
//! backend (requires the `gpio-hardware` build feature) or the
//! simulated backend (`--simulate`, also the fallback of builds
//! without hardware support). The rig configuration is read from a
//! TOML file and created with defaults on first run.

use clap::{Parser, Subcommand};
use keyloader_common::config::load_or_create;
use keyloader_common::state::{
    CycleReport, MachineState, SensorFlags, StationOutcome, StatusSnapshot,
};
use keyloader_hal::sim::SimGpio;
use keyloader_hal::{Delay, Gpio, ThreadDelay};
use keyloader_motion::Controller;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn, Level as LogLevel};
use tracing_subscriber::EnvFilter;

/// Keyloader rig control — homing, jogging and multi-station cycles
#[derive(Parser, Debug)]
#[command(name = "keyloader_ctl")]
#[command(version)]
#[command(about = "Operator CLI for the rotary keyloader rig")]
struct Args {
    /// Path to the rig configuration TOML (created with defaults if missing).
    #[arg(long, value_name = "FILE", default_value = "config/rig.toml")]
    config: PathBuf,

    /// Use the simulated GPIO backend instead of real hardware.
    #[arg(short, long)]
    simulate: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs (and `status`) in JSON format.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Home the rotary axis against the hall sensor.
    Home,
    /// Move the rotary axis by a relative angle.
    Jog {
        /// Relative move in degrees; negative reverses direction.
        degrees: f64,
        /// Speed 1-100; defaults to the configured rotary speed.
        #[arg(long)]
        speed: Option<u8>,
    },
    /// Run the multi-station load cycle.
    Cycle {
        /// Number of stations; defaults to the configured cycle count.
        #[arg(long)]
        count: Option<u32>,
    },
    /// Declare the current position as zero without homing.
    Zero,
    /// Print the machine status.
    Status,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_create(&args.config)?;
    info!(
        "config OK: {} pulses/rev, step {}\u{b0}, slider {}",
        config.rotary.pulses_per_rev,
        config.cycle.step_degrees,
        if config.slider.enabled { "enabled" } else { "disabled" },
    );

    if args.simulate {
        return execute(
            Controller::new(bench_backend(), ThreadDelay, config),
            args,
        );
    }

    #[cfg(feature = "gpio-hardware")]
    {
        let map = keyloader_hal::lines::PinMap::default();
        let gpio = keyloader_hal::sysfs::SysfsGpio::new(&map)?;
        execute(Controller::new(gpio, ThreadDelay, config), args)
    }

    #[cfg(not(feature = "gpio-hardware"))]
    {
        warn!("built without the gpio-hardware feature, using the simulated backend");
        execute(Controller::new(bench_backend(), ThreadDelay, config), args)
    }
}

/// Simulated rig in its parked pose: disc on the hall mark, slider
/// retracted against its inner switch. Homing and dry cycles succeed;
/// no key is present, so stations report as skipped.
fn bench_backend() -> SimGpio {
    use keyloader_hal::lines::Line;
    let gpio = SimGpio::new();
    gpio.assert_sensor(Line::Hall);
    gpio.assert_sensor(Line::SliderMin);
    gpio
}

fn execute<G, D>(controller: Controller<G, D>, args: &Args) -> Result<(), Box<dyn std::error::Error>>
where
    G: Gpio + Send + 'static,
    D: Delay + Send + 'static,
{
    let controller = Arc::new(controller);

    // The handler waits for any in-flight move to release the rig, so
    // a mid-cycle interrupt parks the drivers only once the current
    // motion command has run to completion.
    let parker = Arc::clone(&controller);
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        if let Err(e) = parker.disable_motors() {
            warn!("failed to park the drivers: {e}");
        }
        process::exit(130);
    })?;

    match &args.command {
        Command::Home => {
            controller.home()?;
            println!("homing successful, disc at 0.0\u{b0}");
        }
        Command::Jog { degrees, speed } => {
            controller.jog(*degrees, *speed)?;
            println!(
                "jog complete, disc at {:.1}\u{b0}",
                controller.status().angle_deg
            );
        }
        Command::Cycle { count } => {
            let report = controller.run_cycle(*count)?;
            print_report(&report);
            controller.disable_motors()?;
            if !report.completed() {
                process::exit(2);
            }
        }
        Command::Zero => {
            controller.set_zero()?;
            println!("zero override applied, disc at 0.0\u{b0}");
        }
        Command::Status => {
            let snapshot = controller.status();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_status(&snapshot);
            }
        }
    }

    Ok(())
}

fn print_status(snapshot: &StatusSnapshot) {
    println!("state:    {}", state_name(snapshot.state));
    println!("angle:    {:.1}\u{b0}", snapshot.angle_deg);
    println!("homed:    {}", snapshot.homed);
    println!("running:  {}", snapshot.running);
    println!(
        "sensors:  hall={} inductive={} slider_min={} slider_max={}",
        on_off(snapshot.sensors.contains(SensorFlags::HALL)),
        on_off(snapshot.sensors.contains(SensorFlags::INDUCTIVE)),
        on_off(snapshot.sensors.contains(SensorFlags::SLIDER_MIN)),
        on_off(snapshot.sensors.contains(SensorFlags::SLIDER_MAX)),
    );
    println!("message:  {}", snapshot.message);
}

fn print_report(report: &CycleReport) {
    for record in &report.stations {
        let outcome = match record.outcome {
            StationOutcome::Moved => "moved",
            StationOutcome::KeyTriggered => "key triggered",
            StationOutcome::KeySkipped => "no key, skipped",
            StationOutcome::Faulted => "FAULTED",
        };
        println!(
            "station {:>3}  {:>6.1}\u{b0}  {outcome}",
            record.station, record.target_deg
        );
    }
    match report.abort_reason() {
        None => println!("cycle complete: {} stations", report.stations.len()),
        Some(reason) => println!("cycle aborted: {reason}"),
    }
}

fn state_name(state: MachineState) -> &'static str {
    match state {
        MachineState::Idle => "idle",
        MachineState::Homing => "homing",
        MachineState::Ready => "ready",
        MachineState::Running => "running",
        MachineState::Faulted => "faulted",
    }
}

fn on_off(asserted: bool) -> &'static str {
    if asserted { "on" } else { "off" }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        LogLevel::DEBUG
    } else {
        LogLevel::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
