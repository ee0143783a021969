//! Polled sensor reads, normalized to asserted = `true`.
//!
//! The rig is wired active-low throughout (internal pull-ups), so a low
//! electrical level means the sensor is asserted. Nothing is cached;
//! every call re-samples the input. Reads are side-effect-free and
//! freely shareable between callers.

use keyloader_common::error::GpioError;
use keyloader_common::state::SensorFlags;
use keyloader_hal::lines::Line;
use keyloader_hal::{Gpio, Level};

/// Binary inputs the engine polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    /// Rotary home reference (hall).
    Hall,
    /// Key presence (inductive).
    Inductive,
    /// Slider retracted limit.
    SliderMin,
    /// Slider extended limit.
    SliderMax,
    /// Rotary driver stall/fault line.
    Alarm,
}

impl Sensor {
    const fn line(self) -> Line {
        match self {
            Sensor::Hall => Line::Hall,
            Sensor::Inductive => Line::Inductive,
            Sensor::SliderMin => Line::SliderMin,
            Sensor::SliderMax => Line::SliderMax,
            Sensor::Alarm => Line::RotaryAlarm,
        }
    }
}

/// Sample one sensor. `true` = asserted, polarity already normalized.
pub fn read<G: Gpio>(gpio: &mut G, sensor: Sensor) -> Result<bool, GpioError> {
    Ok(gpio.read(sensor.line())? == Level::Low)
}

/// Pack the four binary sensors into flags for the status query.
/// The alarm line is not part of the snapshot; it is only meaningful
/// while pulses are being issued.
pub fn snapshot<G: Gpio>(gpio: &mut G) -> Result<SensorFlags, GpioError> {
    let mut flags = SensorFlags::empty();
    flags.set(SensorFlags::HALL, read(gpio, Sensor::Hall)?);
    flags.set(SensorFlags::INDUCTIVE, read(gpio, Sensor::Inductive)?);
    flags.set(SensorFlags::SLIDER_MIN, read(gpio, Sensor::SliderMin)?);
    flags.set(SensorFlags::SLIDER_MAX, read(gpio, Sensor::SliderMax)?);
    Ok(flags)
}
