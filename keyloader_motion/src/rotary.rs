//! Rotary indexing table axis.
//!
//! Owns homing (seek the hall sensor) and ramped relative moves with a
//! trapezoidal accel/cruise/decel profile. The alarm input is sampled
//! before every single pulse; assertion aborts the move immediately.
//! Position is tracked, not measured: the angle is advanced only on a
//! fully completed move and is deliberately left stale after a fault,
//! because the actual position is then unknown.

use crate::pulse::{set_enabled, step_once};
use crate::sensors::{self, Sensor};
use crate::Io;
use keyloader_common::error::MotionError;
use keyloader_hal::lines::Line;
use keyloader_hal::{Delay, Gpio, Level};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Homing travel budget as a fraction of one revolution.
const HOMING_BUDGET_REVS: f64 = 1.5;

/// Fixed half-period during homing.
const HOMING_HALF_PERIOD: Duration = Duration::from_micros(500);

/// Pulses for a relative move of `degrees` at `pulses_per_rev`.
pub(crate) fn steps_for(degrees: f64, pulses_per_rev: u32) -> u32 {
    ((degrees.abs() / 360.0) * f64::from(pulses_per_rev)).round() as u32
}

/// Map a 0-100 speed to the cruise half-period. Zero falls back to a
/// fixed slow delay. The 500 us floor guards against a future wider
/// speed range; within 0-100 the mapping bottoms out at 10 ms.
pub(crate) fn speed_to_delay(speed: u8) -> Duration {
    if speed == 0 {
        return Duration::from_millis(10);
    }
    let seconds = (0.01 / (f64::from(speed) / 100.0)).max(0.0005);
    Duration::from_secs_f64(seconds)
}

/// Clamp ramp lengths to half the move each and derive the cruise count.
pub(crate) fn ramp_phases(steps: u32, accel_steps: u32, decel_steps: u32) -> (u32, u32, u32) {
    let accel = accel_steps.min(steps / 2);
    let decel = decel_steps.min(steps / 2);
    (accel, steps - accel - decel, decel)
}

/// The rotary axis: tracked state plus the rig's pulses-per-revolution.
#[derive(Debug)]
pub struct RotaryAxis {
    pulses_per_rev: u32,
    angle_deg: f64,
    homed: bool,
}

impl RotaryAxis {
    /// New axis, unhomed at a nominal 0 degrees.
    pub fn new(pulses_per_rev: u32) -> Self {
        Self {
            pulses_per_rev,
            angle_deg: 0.0,
            homed: false,
        }
    }

    /// Tracked angle [deg, 0..360).
    #[inline]
    pub fn angle_deg(&self) -> f64 {
        self.angle_deg
    }

    /// True after a successful homing or a zero override.
    #[inline]
    pub fn homed(&self) -> bool {
        self.homed
    }

    /// Homing pulse budget (1.5 revolutions).
    #[inline]
    pub fn homing_budget(&self) -> u32 {
        (f64::from(self.pulses_per_rev) * HOMING_BUDGET_REVS) as u32
    }

    /// Operator override: declare the current position to be zero and
    /// homed, without sensor confirmation. Not a substitute for homing.
    pub fn set_zero(&mut self) {
        warn!("zero override: marking current position as homed 0\u{b0}");
        self.angle_deg = 0.0;
        self.homed = true;
    }

    /// Overwrite the tracked angle after a confirmed indexing move.
    pub(crate) fn set_angle(&mut self, angle_deg: f64) {
        self.angle_deg = angle_deg.rem_euclid(360.0);
    }

    /// Seek the hall sensor: fixed homing direction, hall checked before
    /// each pulse, at most 1.5 revolutions of travel. On success the
    /// angle resets to 0. On failure the motor is disabled - the one
    /// operation that proactively disables, signaling "do not trust this
    /// axis further" - and `homed` is cleared.
    pub fn home<G: Gpio, D: Delay>(&mut self, io: &mut Io<G, D>) -> Result<(), MotionError> {
        info!("homing: seeking hall sensor");
        set_enabled(io, Line::RotaryEnable, true)?;
        io.gpio.write(Line::RotaryDir, Level::Low)?;

        let budget = self.homing_budget();
        for issued in 0..budget {
            if sensors::read(&mut io.gpio, Sensor::Hall)? {
                self.angle_deg = 0.0;
                self.homed = true;
                info!(pulses = issued, "homing complete, hall detected");
                return Ok(());
            }
            step_once(io, Line::RotaryStep, HOMING_HALF_PERIOD)?;
        }

        self.homed = false;
        set_enabled(io, Line::RotaryEnable, false)?;
        warn!(budget, "homing failed, hall not detected within travel budget");
        Err(MotionError::HomingFailed { budget })
    }

    /// Ramped relative move. Direction comes from the sign of `degrees`
    /// (>= 0 is positive/DIR high). The per-pulse delay ramps linearly
    /// from 2x base down to base over the accel phase, holds at base
    /// through cruise, and ramps back up through decel.
    ///
    /// The alarm line is sampled before every pulse; on assertion the
    /// move aborts with a stall fault, the motor stays enabled (holding
    /// torque for inspection) and the tracked angle is left unmodified.
    pub fn move_relative<G: Gpio, D: Delay>(
        &mut self,
        io: &mut Io<G, D>,
        degrees: f64,
        speed: u8,
        accel_steps: u32,
        decel_steps: u32,
    ) -> Result<(), MotionError> {
        let steps = steps_for(degrees, self.pulses_per_rev);
        if steps == 0 {
            self.angle_deg = (self.angle_deg + degrees).rem_euclid(360.0);
            debug!(degrees, "move rounds to zero pulses");
            return Ok(());
        }

        set_enabled(io, Line::RotaryEnable, true)?;
        let direction = if degrees >= 0.0 { Level::High } else { Level::Low };
        io.gpio.write(Line::RotaryDir, direction)?;

        let base = speed_to_delay(speed);
        let (accel, cruise, decel) = ramp_phases(steps, accel_steps, decel_steps);
        debug!(
            steps,
            accel,
            cruise,
            decel,
            base_us = base.as_micros() as u64,
            "rotary move {degrees:+.2}\u{b0}"
        );

        let mut issued = 0u32;
        let mut check_and_step = |io: &mut Io<G, D>,
                                  half_period: Duration|
         -> Result<(), MotionError> {
            if sensors::read(&mut io.gpio, Sensor::Alarm)? {
                warn!(issued, total = steps, "motor stalled, alarm asserted");
                return Err(MotionError::Stall {
                    issued,
                    total: steps,
                });
            }
            step_once(io, Line::RotaryStep, half_period)?;
            issued += 1;
            Ok(())
        };

        for i in 0..accel {
            let multiplier = 1.0 + f64::from(accel - i) / f64::from(accel);
            check_and_step(io, base.mul_f64(multiplier))?;
        }
        for _ in 0..cruise {
            check_and_step(io, base)?;
        }
        for i in 0..decel {
            let multiplier = 1.0 + f64::from(i + 1) / f64::from(decel);
            check_and_step(io, base.mul_f64(multiplier))?;
        }

        // Motor stays enabled to hold position; disabling is a caller
        // decision.
        self.angle_deg = (self.angle_deg + degrees).rem_euclid(360.0);
        Ok(())
    }
}
