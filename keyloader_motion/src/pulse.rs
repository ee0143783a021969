//! Step pulse and enable-line primitives.
//!
//! A pulse is one rising+falling edge pair with a configurable
//! half-period. Pulsing a disabled axis is a caller error and is not
//! validated here; stepper drivers ignore pulses while disabled.

use crate::Io;
use keyloader_common::error::GpioError;
use keyloader_hal::lines::Line;
use keyloader_hal::{Delay, Gpio, Level};
use std::time::Duration;

/// Driver wake-up settle time after asserting an enable line.
pub const ENABLE_SETTLE: Duration = Duration::from_millis(100);

/// Emit one step pulse: high, wait, low, wait.
pub fn step_once<G: Gpio, D: Delay>(
    io: &mut Io<G, D>,
    step: Line,
    half_period: Duration,
) -> Result<(), GpioError> {
    io.gpio.write(step, Level::High)?;
    io.delay.sleep(half_period);
    io.gpio.write(step, Level::Low)?;
    io.delay.sleep(half_period);
    Ok(())
}

/// Drive a motor enable line. The convention is active-low: enabled is
/// low. Enabling settles for [`ENABLE_SETTLE`] before returning so the
/// driver is awake before the first pulse; disabling returns at once.
pub fn set_enabled<G: Gpio, D: Delay>(
    io: &mut Io<G, D>,
    enable: Line,
    enabled: bool,
) -> Result<(), GpioError> {
    let level = if enabled { Level::Low } else { Level::High };
    io.gpio.write(enable, level)?;
    if enabled {
        io.delay.sleep(ENABLE_SETTLE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyloader_hal::sim::{SimDelay, SimGpio};

    fn sim_io() -> (Io<SimGpio, SimDelay>, SimGpio, SimDelay) {
        let gpio = SimGpio::new();
        let delay = SimDelay::new();
        (Io::new(gpio.clone(), delay.clone()), gpio, delay)
    }

    #[test]
    fn step_once_emits_one_edge_pair() {
        let (mut io, gpio, delay) = sim_io();
        step_once(&mut io, Line::RotaryStep, Duration::from_micros(500)).unwrap();
        assert_eq!(gpio.pulses(Line::RotaryStep), 1);
        assert_eq!(gpio.output(Line::RotaryStep), Level::Low);
        assert_eq!(delay.elapsed(), Duration::from_millis(1));
    }

    #[test]
    fn enable_is_active_low_and_settles() {
        let (mut io, gpio, delay) = sim_io();
        set_enabled(&mut io, Line::RotaryEnable, true).unwrap();
        assert_eq!(gpio.output(Line::RotaryEnable), Level::Low);
        assert_eq!(delay.elapsed(), ENABLE_SETTLE);

        set_enabled(&mut io, Line::RotaryEnable, false).unwrap();
        assert_eq!(gpio.output(Line::RotaryEnable), Level::High);
        // No settle on disable.
        assert_eq!(delay.elapsed(), ENABLE_SETTLE);
    }
}
