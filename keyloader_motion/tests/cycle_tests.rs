//! End-to-end cycle engine tests against the simulated rig.
//!
//! Pulse arithmetic for the default rig: 3200 pulses/rev, so one 36 deg
//! station is exactly 320 pulses.

use keyloader_common::config::RigConfig;
use keyloader_common::error::MotionError;
use keyloader_common::state::{
    AbortReason, CycleSummary, MachineState, SensorFlags, StationOutcome,
};
use keyloader_hal::lines::Line;
use keyloader_hal::sim::{SimDelay, SimGpio};
use keyloader_hal::{Delay, Level};
use keyloader_motion::Controller;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

fn sim_controller(config: RigConfig) -> (Controller<SimGpio, SimDelay>, SimGpio) {
    let gpio = SimGpio::new();
    let controller = Controller::new(gpio.clone(), SimDelay::new(), config);
    (controller, gpio)
}

#[test]
fn cycle_completes_without_keys() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    gpio.assert_sensor(Line::Hall);

    controller.home().unwrap();
    let report = controller.run_cycle(Some(3)).unwrap();

    assert_eq!(report.summary, CycleSummary::Completed);
    let targets: Vec<f64> = report.stations.iter().map(|s| s.target_deg).collect();
    assert_eq!(targets, vec![36.0, 72.0, 108.0]);
    for record in &report.stations {
        assert_eq!(record.outcome, StationOutcome::KeySkipped);
    }

    // No key, no slider moves.
    assert_eq!(gpio.pulses(Line::SliderStep), 0);
    // Homing found the hall immediately; all pulses are the 3 moves.
    assert_eq!(gpio.pulses(Line::RotaryStep), 3 * 320);

    let status = controller.status();
    assert!(!status.running);
    assert_eq!(status.state, MachineState::Ready);
    assert_eq!(status.angle_deg, 108.0);
}

#[test]
fn cycle_aborts_on_stall_at_second_station() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    gpio.assert_sensor(Line::Hall);
    controller.home().unwrap();

    // Station 1 is pulses 1..=320; stall 80 pulses into station 2.
    gpio.trigger_after_pulses(Line::RotaryStep, 400, Line::RotaryAlarm, Level::Low);

    let report = controller.run_cycle(Some(3)).unwrap();
    assert_eq!(report.summary, CycleSummary::Aborted(AbortReason::Stall));
    assert_eq!(report.stations.len(), 2);
    assert_eq!(report.stations[0].outcome, StationOutcome::KeySkipped);
    assert_eq!(report.stations[1].outcome, StationOutcome::Faulted);

    // Angle stays at the first station's confirmed value.
    let status = controller.status();
    assert_eq!(status.angle_deg, 36.0);
    assert!(!status.running);
    assert_eq!(status.state, MachineState::Faulted);

    // Alarm check happens before each pulse: 400 issued, then the abort.
    assert_eq!(gpio.pulses(Line::RotaryStep), 400);
}

#[test]
fn cycle_triggers_slider_when_key_present() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    gpio.assert_sensor(Line::Hall);
    gpio.assert_sensor(Line::Inductive);
    // Extend reaches the max switch after 10 pulses, retract reaches the
    // min switch after 15 more.
    gpio.trigger_after_pulses(Line::SliderStep, 10, Line::SliderMax, Level::Low);
    gpio.trigger_after_pulses(Line::SliderStep, 25, Line::SliderMin, Level::Low);

    controller.home().unwrap();
    let report = controller.run_cycle(Some(1)).unwrap();

    assert_eq!(report.summary, CycleSummary::Completed);
    assert_eq!(report.stations[0].outcome, StationOutcome::KeyTriggered);
    assert_eq!(gpio.pulses(Line::SliderStep), 25);
}

#[test]
fn cycle_aborts_when_slider_never_reaches_limit() {
    let mut config = RigConfig::default();
    config.slider.max_pulses = 5;
    let (controller, gpio) = sim_controller(config);
    gpio.assert_sensor(Line::Hall);
    gpio.assert_sensor(Line::Inductive);

    controller.home().unwrap();
    let report = controller.run_cycle(Some(2)).unwrap();

    assert_eq!(report.summary, CycleSummary::Aborted(AbortReason::SliderFault));
    assert_eq!(report.stations.len(), 1);
    assert_eq!(report.stations[0].outcome, StationOutcome::Faulted);
    // Budget exhausted after exactly 5 pulses; retract never attempted.
    assert_eq!(gpio.pulses(Line::SliderStep), 5);
}

#[test]
fn cycle_aborts_on_position_mismatch() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    // Homed by override; the hall stays deasserted, so the first
    // station's confirmation check fails.
    controller.set_zero().unwrap();

    let report = controller.run_cycle(Some(3)).unwrap();
    assert_eq!(
        report.summary,
        CycleSummary::Aborted(AbortReason::PositionMismatch)
    );
    assert_eq!(report.stations.len(), 1);
    assert_eq!(report.stations[0].outcome, StationOutcome::Faulted);
    assert_eq!(gpio.pulses(Line::RotaryStep), 320);
}

#[test]
fn cycle_without_slider_records_moved() {
    let mut config = RigConfig::default();
    config.slider.enabled = false;
    let (controller, gpio) = sim_controller(config);
    gpio.assert_sensor(Line::Hall);
    // Key present, but this rig has nothing to trigger with.
    gpio.assert_sensor(Line::Inductive);

    controller.home().unwrap();
    let report = controller.run_cycle(Some(2)).unwrap();

    assert_eq!(report.summary, CycleSummary::Completed);
    for record in &report.stations {
        assert_eq!(record.outcome, StationOutcome::Moved);
    }
    assert_eq!(gpio.pulses(Line::SliderStep), 0);
}

#[test]
fn run_cycle_requires_homing() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    let err = controller.run_cycle(None).unwrap_err();
    assert_eq!(err, MotionError::NotHomed);
    assert_eq!(gpio.pulses(Line::RotaryStep), 0);
    assert!(!controller.status().running);
}

#[test]
fn set_zero_is_idempotent_and_readies_the_machine() {
    let (controller, _gpio) = sim_controller(RigConfig::default());

    for _ in 0..2 {
        controller.set_zero().unwrap();
        let status = controller.status();
        assert_eq!(status.angle_deg, 0.0);
        assert!(status.homed);
        assert_eq!(status.state, MachineState::Ready);
    }
}

#[test]
fn jog_zero_crossing_requires_hall_confirmation() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    controller.set_zero().unwrap();

    // Full revolution wrapping back to 0 with the hall deasserted: the
    // pulses complete but the jog is downgraded to a failure.
    let err = controller.jog(360.0, None).unwrap_err();
    assert_eq!(err, MotionError::PositionMismatch { angle_deg: 0.0 });
    assert_eq!(controller.status().state, MachineState::Faulted);

    // Same wrap with the hall asserted passes.
    gpio.assert_sensor(Line::Hall);
    controller.jog(360.0, None).unwrap();
    assert_eq!(controller.status().angle_deg, 0.0);
}

#[test]
fn jog_away_from_zero_needs_no_confirmation() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    controller.set_zero().unwrap();

    controller.jog(90.0, Some(80)).unwrap();
    let status = controller.status();
    assert_eq!(status.angle_deg, 90.0);
    assert_eq!(status.state, MachineState::Ready);
    assert_eq!(gpio.pulses(Line::RotaryStep), 800);
}

#[test]
fn status_samples_sensors_live_when_idle() {
    let (controller, gpio) = sim_controller(RigConfig::default());
    assert_eq!(controller.status().sensors, SensorFlags::empty());

    gpio.assert_sensor(Line::Hall);
    gpio.assert_sensor(Line::SliderMax);
    assert_eq!(
        controller.status().sensors,
        SensorFlags::HALL | SensorFlags::SLIDER_MAX
    );
}

/// Delay whose first sleep parks until the test releases it, holding the
/// controller mid-operation with the busy flag set.
struct BlockingDelay {
    started: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
    parked_once: bool,
}

impl Delay for BlockingDelay {
    fn sleep(&mut self, _duration: Duration) {
        if !self.parked_once {
            self.parked_once = true;
            let _ = self.started.send(());
            let _ = self.release.recv();
        }
    }
}

#[test]
fn busy_operations_are_rejected_without_side_effects() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gpio = SimGpio::new();
    gpio.assert_sensor(Line::Hall);

    let delay = BlockingDelay {
        started: started_tx,
        release: release_rx,
        parked_once: false,
    };
    let controller = Arc::new(Controller::new(gpio.clone(), delay, RigConfig::default()));

    // Homing parks in the enable settle delay with the busy flag held.
    let worker = {
        let controller = Arc::clone(&controller);
        std::thread::spawn(move || controller.home())
    };
    started_rx.recv().unwrap();

    assert_eq!(controller.home().unwrap_err(), MotionError::Busy);
    assert_eq!(controller.jog(36.0, None).unwrap_err(), MotionError::Busy);
    assert_eq!(controller.run_cycle(None).unwrap_err(), MotionError::Busy);
    assert_eq!(controller.set_zero().unwrap_err(), MotionError::Busy);
    assert!(controller.status().running);
    // The rejected calls issued no pulses.
    assert_eq!(gpio.pulses(Line::RotaryStep), 0);

    release_tx.send(()).unwrap();
    worker.join().unwrap().unwrap();

    let status = controller.status();
    assert!(!status.running);
    assert!(status.homed);
    assert_eq!(status.state, MachineState::Ready);
}
