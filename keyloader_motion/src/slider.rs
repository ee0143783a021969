//! Linear slider axis.
//!
//! Bounded moves toward either hard limit: the corresponding limit
//! switch is checked before every pulse and a hard pulse ceiling bounds
//! runaway if the switch never asserts. No alarm line is wired on this
//! axis, so the budget is the only protection.

use crate::pulse::{set_enabled, step_once};
use crate::sensors::{self, Sensor};
use crate::Io;
use keyloader_common::error::GpioError;
use keyloader_common::state::SliderDirection;
use keyloader_hal::lines::Line;
use keyloader_hal::{Delay, Gpio, Level};
use std::time::Duration;
use tracing::{debug, warn};

/// The slider axis. Present only on rigs with a slider rail; resolved
/// once at startup, never probed per call.
#[derive(Debug)]
pub struct SliderAxis {
    max_pulses: u32,
}

impl SliderAxis {
    /// New axis with the configured runaway pulse ceiling.
    pub fn new(max_pulses: u32) -> Self {
        Self { max_pulses }
    }

    /// Configured pulse ceiling.
    #[inline]
    pub fn max_pulses(&self) -> u32 {
        self.max_pulses
    }

    /// Drive toward a limit: enable, fix direction, then pulse with the
    /// limit switch checked before each pulse. Returns `true` on the
    /// first asserted read, `false` when the budget runs out.
    pub fn move_to_limit<G: Gpio, D: Delay>(
        &self,
        io: &mut Io<G, D>,
        direction: SliderDirection,
        half_period: Duration,
        max_pulses: u32,
    ) -> Result<bool, GpioError> {
        set_enabled(io, Line::SliderEnable, true)?;

        let (dir_level, limit) = match direction {
            SliderDirection::Max => (Level::High, Sensor::SliderMax),
            SliderDirection::Min => (Level::Low, Sensor::SliderMin),
        };
        io.gpio.write(Line::SliderDir, dir_level)?;
        debug!(%direction, max_pulses, "slider seeking limit");

        for issued in 0..max_pulses {
            if sensors::read(&mut io.gpio, limit)? {
                debug!(%direction, pulses = issued, "slider limit reached");
                return Ok(true);
            }
            step_once(io, Line::SliderStep, half_period)?;
        }

        warn!(%direction, max_pulses, "slider pulse budget exhausted");
        Ok(false)
    }
}
