//! Cycle controller: busy lock, machine state, the station loop.
//!
//! Owns the one mutable run-state of the process. Every entry point that
//! issues pulses takes the busy flag with a compare-exchange and clears
//! it through an RAII guard, so the clear happens on every exit path.
//! Callers observing busy are rejected immediately; there is no queue.
//!
//! A mutex-guarded status board is republished at every transition and
//! at every station, so the status query stays meaningful while a cycle
//! is blocking in here.

use crate::pulse::set_enabled;
use crate::rotary::RotaryAxis;
use crate::sensors::{self, Sensor};
use crate::slider::SliderAxis;
use crate::Io;
use keyloader_common::config::RigConfig;
use keyloader_common::error::MotionError;
use keyloader_common::state::{
    AbortReason, CycleReport, CycleSummary, MachineState, SliderDirection, StationOutcome,
    StationRecord, StatusSnapshot,
};
use keyloader_hal::lines::Line;
use keyloader_hal::{Delay, Gpio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

/// Angle tolerance for the zero-crossing hall verification.
const ZERO_CROSS_TOL_DEG: f64 = 1e-6;

/// Slider capability, resolved once at startup from the rig config.
#[derive(Debug)]
pub enum RigProfile {
    /// Slider rail wired; stations with a key run the trigger sub-cycle.
    WithSlider(SliderAxis),
    /// No slider; stations only index.
    WithoutSlider,
}

struct Rig<G: Gpio, D: Delay> {
    io: Io<G, D>,
    rotary: RotaryAxis,
    profile: RigProfile,
    config: RigConfig,
}

/// The cycle controller. `Sync`: share it behind `Arc` with a request
/// layer; concurrent motion requests lose the compare-exchange and get
/// [`MotionError::Busy`].
pub struct Controller<G: Gpio, D: Delay> {
    busy: AtomicBool,
    rig: Mutex<Rig<G, D>>,
    board: Mutex<StatusSnapshot>,
}

/// Clears the busy flag on drop, covering success, abort and early
/// return alike.
struct RunGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl<G: Gpio, D: Delay> Controller<G, D> {
    /// Build a controller from a backend, delay source and validated
    /// config. The slider capability is resolved here, never probed
    /// again.
    pub fn new(gpio: G, delay: D, config: RigConfig) -> Self {
        let profile = if config.slider.enabled {
            RigProfile::WithSlider(SliderAxis::new(config.slider.max_pulses))
        } else {
            RigProfile::WithoutSlider
        };
        let rotary = RotaryAxis::new(config.rotary.pulses_per_rev);
        Self {
            busy: AtomicBool::new(false),
            rig: Mutex::new(Rig {
                io: Io::new(gpio, delay),
                rotary,
                profile,
                config,
            }),
            board: Mutex::new(StatusSnapshot::default()),
        }
    }

    fn begin(&self) -> Result<RunGuard<'_>, MotionError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| MotionError::Busy)?;
        Ok(RunGuard { busy: &self.busy })
    }

    fn rig(&self) -> MutexGuard<'_, Rig<G, D>> {
        self.rig.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: MachineState, angle_deg: f64, homed: bool, message: &str) {
        let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
        board.state = state;
        board.angle_deg = angle_deg;
        board.homed = homed;
        board.running = matches!(state, MachineState::Running | MachineState::Homing);
        board.message = message.to_string();
    }

    /// Home the rotary axis against the hall sensor.
    pub fn home(&self) -> Result<(), MotionError> {
        let _run = self.begin()?;
        let mut rig = self.rig();
        self.publish(MachineState::Homing, rig.rotary.angle_deg(), false, "homing in progress");

        let Rig { io, rotary, .. } = &mut *rig;
        match rotary.home(io) {
            Ok(()) => {
                self.publish(
                    MachineState::Ready,
                    0.0,
                    true,
                    "homing successful, ready to start cycle",
                );
                Ok(())
            }
            Err(e) => {
                error!("homing failed: {e}");
                self.publish(
                    MachineState::Faulted,
                    rotary.angle_deg(),
                    false,
                    "homing failed, check switch and wiring",
                );
                Err(e)
            }
        }
    }

    /// Manual jog: one ramped relative move with a zero-crossing check.
    ///
    /// If the resulting angle wraps to within tolerance of 0 deg, the
    /// hall sensor must confirm it; otherwise the jog is reported as a
    /// position mismatch even though the pulses completed. This is the
    /// one point per revolution where ground truth is checkable.
    pub fn jog(&self, degrees: f64, speed: Option<u8>) -> Result<(), MotionError> {
        let _run = self.begin()?;
        let mut rig = self.rig();
        let speed = speed.unwrap_or(rig.config.rotary.speed);
        let (accel, decel) = (rig.config.rotary.accel_steps, rig.config.rotary.decel_steps);
        self.publish(
            MachineState::Running,
            rig.rotary.angle_deg(),
            rig.rotary.homed(),
            "jogging",
        );

        let Rig { io, rotary, .. } = &mut *rig;
        let mut result = rotary.move_relative(io, degrees, speed, accel, decel);
        if result.is_ok() {
            let angle = rotary.angle_deg();
            let near_zero = angle < ZERO_CROSS_TOL_DEG || (360.0 - angle) < ZERO_CROSS_TOL_DEG;
            if near_zero {
                match sensors::read(&mut io.gpio, Sensor::Hall) {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!("zero crossing without hall confirmation, possible slip");
                        result = Err(MotionError::PositionMismatch { angle_deg: angle });
                    }
                    Err(e) => result = Err(e.into()),
                }
            }
        }

        match &result {
            Ok(()) => {
                let state = if rotary.homed() {
                    MachineState::Ready
                } else {
                    MachineState::Idle
                };
                self.publish(state, rotary.angle_deg(), rotary.homed(), "jog complete");
            }
            Err(e) => {
                error!("jog failed: {e}");
                self.publish(
                    MachineState::Faulted,
                    rotary.angle_deg(),
                    rotary.homed(),
                    &format!("jog failed: {e}"),
                );
            }
        }
        result
    }

    /// Run the multi-station cycle.
    ///
    /// Requires a homed axis. Per station: ramped index move, settle,
    /// hall confirmation, then - on rigs with a slider and a key present
    /// - the extend/retract/dwell sub-cycle. The first unrecoverable
    /// fault aborts the loop; the report records every station reached
    /// and the terminal summary. The tracked angle stays at the last
    /// successfully reached station after an abort.
    pub fn run_cycle(&self, count_override: Option<u32>) -> Result<CycleReport, MotionError> {
        let _run = self.begin()?;
        let mut rig = self.rig();
        if !rig.rotary.homed() {
            self.publish(
                MachineState::Idle,
                rig.rotary.angle_deg(),
                false,
                "machine must be homed before starting a cycle",
            );
            return Err(MotionError::NotHomed);
        }

        let config = rig.config.clone();
        let count = count_override.unwrap_or(config.cycle.cycle_count);
        let settle = Duration::from_millis(config.rotary.settle_ms);
        let dwell = Duration::from_millis(config.cycle.dwell_ms);
        let out_delay = Duration::from_secs_f64(config.cycle.slider_out_delay_s);
        let in_delay = Duration::from_secs_f64(config.cycle.slider_in_delay_s);
        info!(count, step = config.cycle.step_degrees, "cycle started");

        let mut stations: Vec<StationRecord> = Vec::with_capacity(count as usize);
        let mut abort: Option<AbortReason> = None;

        let Rig {
            io,
            rotary,
            profile,
            ..
        } = &mut *rig;

        for station in 1..=count {
            let target = (f64::from(station) * config.cycle.step_degrees).rem_euclid(360.0);
            self.publish(
                MachineState::Running,
                rotary.angle_deg(),
                true,
                &format!("moving to station {station} ({target:.1}\u{b0})"),
            );

            match rotary.move_relative(
                io,
                config.cycle.step_degrees,
                config.rotary.speed,
                config.rotary.accel_steps,
                config.rotary.decel_steps,
            ) {
                Ok(()) => {}
                Err(MotionError::Stall { issued, total }) => {
                    error!(station, issued, total, "motor stalled during cycle");
                    stations.push(StationRecord {
                        station,
                        target_deg: target,
                        outcome: StationOutcome::Faulted,
                    });
                    abort = Some(AbortReason::Stall);
                    break;
                }
                Err(e) => {
                    self.publish(
                        MachineState::Faulted,
                        rotary.angle_deg(),
                        rotary.homed(),
                        &format!("cycle failed: {e}"),
                    );
                    return Err(e);
                }
            }
            rotary.set_angle(target);

            io.delay.sleep(settle);
            if !sensors::read(&mut io.gpio, Sensor::Hall)? {
                error!(station, target, "position mismatch, hall not confirmed");
                stations.push(StationRecord {
                    station,
                    target_deg: target,
                    outcome: StationOutcome::Faulted,
                });
                abort = Some(AbortReason::PositionMismatch);
                break;
            }

            let outcome = match profile {
                RigProfile::WithoutSlider => StationOutcome::Moved,
                RigProfile::WithSlider(slider) => {
                    if sensors::read(&mut io.gpio, Sensor::Inductive)? {
                        info!(station, target, "key detected, triggering");
                        let out_ok = slider.move_to_limit(
                            io,
                            SliderDirection::Max,
                            out_delay,
                            config.slider.max_pulses,
                        )?;
                        let in_ok = out_ok
                            && slider.move_to_limit(
                                io,
                                SliderDirection::Min,
                                in_delay,
                                config.slider.max_pulses,
                            )?;
                        io.delay.sleep(dwell);
                        if !(out_ok && in_ok) {
                            let direction = if out_ok {
                                SliderDirection::Min
                            } else {
                                SliderDirection::Max
                            };
                            let fault = MotionError::SliderTimeout {
                                direction,
                                budget: config.slider.max_pulses,
                            };
                            error!(station, "{fault}");
                            stations.push(StationRecord {
                                station,
                                target_deg: target,
                                outcome: StationOutcome::Faulted,
                            });
                            abort = Some(AbortReason::SliderFault);
                            break;
                        }
                        StationOutcome::KeyTriggered
                    } else {
                        info!(station, target, "no key, moving on");
                        StationOutcome::KeySkipped
                    }
                }
            };
            stations.push(StationRecord {
                station,
                target_deg: target,
                outcome,
            });
        }

        let summary = match abort {
            None => {
                info!(count, "cycle complete");
                self.publish(
                    MachineState::Ready,
                    rotary.angle_deg(),
                    true,
                    "cycle complete, ready",
                );
                CycleSummary::Completed
            }
            Some(reason) => {
                self.publish(
                    MachineState::Faulted,
                    rotary.angle_deg(),
                    rotary.homed(),
                    &format!("cycle aborted: {reason}"),
                );
                CycleSummary::Aborted(reason)
            }
        };

        Ok(CycleReport { stations, summary })
    }

    /// Operator override: declare the current position homed zero. No
    /// sensor confirmation; present this as a deliberate override, not a
    /// substitute for homing.
    pub fn set_zero(&self) -> Result<(), MotionError> {
        let _run = self.begin()?;
        let mut rig = self.rig();
        rig.rotary.set_zero();
        self.publish(MachineState::Ready, 0.0, true, "zero override applied");
        Ok(())
    }

    /// Pure status query. Samples the sensors live when the rig is idle;
    /// while a run is in flight it serves the last published board
    /// snapshot instead of blocking on the rig.
    pub fn status(&self) -> StatusSnapshot {
        let running = self.busy.load(Ordering::SeqCst);
        if !running {
            if let Ok(mut rig) = self.rig.try_lock() {
                let angle = rig.rotary.angle_deg();
                let homed = rig.rotary.homed();
                if let Ok(flags) = sensors::snapshot(&mut rig.io.gpio) {
                    let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
                    board.sensors = flags;
                    board.angle_deg = angle;
                    board.homed = homed;
                }
            }
        }
        let mut snapshot = self
            .board
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        snapshot.running = running;
        snapshot
    }

    /// Disable both motor enable lines. Shutdown path: blocks until any
    /// in-flight operation finishes, then parks the drivers.
    pub fn disable_motors(&self) -> Result<(), MotionError> {
        let mut rig = self.rig();
        let Rig { io, .. } = &mut *rig;
        set_enabled(io, Line::RotaryEnable, false)?;
        set_enabled(io, Line::SliderEnable, false)?;
        info!("all motors disabled");
        Ok(())
    }
}
