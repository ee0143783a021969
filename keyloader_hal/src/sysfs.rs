//! Raspberry Pi sysfs GPIO backend (feature `gpio-hardware`).
//!
//! Exports every mapped pin at construction, sets directions, and parks
//! the outputs in their idle levels (enables high = motors disabled).
//! Pins are unexported best-effort on drop.

use crate::lines::{Line, PinMap};
use crate::{Gpio, Level};
use keyloader_common::error::GpioError;
use std::collections::HashMap;
use sysfs_gpio::{Direction, Pin};
use tracing::{info, warn};

/// Sysfs-backed GPIO for the physical rig.
pub struct SysfsGpio {
    pins: HashMap<Line, Pin>,
}

impl SysfsGpio {
    /// Export and configure every line in the map.
    pub fn new(map: &PinMap) -> Result<Self, GpioError> {
        let mut pins = HashMap::new();
        for line in Line::ALL {
            let pin = Pin::new(map.bcm(line));
            pin.export().map_err(|e| {
                GpioError::InitFailed(format!("export {} (BCM {}): {e}", line.name(), map.bcm(line)))
            })?;
            let direction = if line.is_output() {
                Direction::Out
            } else {
                Direction::In
            };
            pin.set_direction(direction).map_err(|e| {
                GpioError::InitFailed(format!("direction {}: {e}", line.name()))
            })?;
            if line.is_output() {
                // Idle: motors disabled (enable high), step/dir low.
                let idle = match line {
                    Line::RotaryEnable | Line::SliderEnable => 1,
                    _ => 0,
                };
                pin.set_value(idle).map_err(|e| {
                    GpioError::InitFailed(format!("init {}: {e}", line.name()))
                })?;
            }
            pins.insert(line, pin);
        }
        info!("sysfs GPIO initialized, {} lines exported", pins.len());
        Ok(Self { pins })
    }

    fn pin(&self, line: Line) -> Result<&Pin, GpioError> {
        self.pins.get(&line).ok_or(GpioError::UnmappedLine(line.name()))
    }
}

impl Gpio for SysfsGpio {
    fn write(&mut self, line: Line, level: Level) -> Result<(), GpioError> {
        let value = match level {
            Level::Low => 0,
            Level::High => 1,
        };
        self.pin(line)?.set_value(value).map_err(|e| GpioError::Io {
            line: line.name(),
            message: e.to_string(),
        })
    }

    fn read(&mut self, line: Line) -> Result<Level, GpioError> {
        let value = self.pin(line)?.get_value().map_err(|e| GpioError::Io {
            line: line.name(),
            message: e.to_string(),
        })?;
        Ok(if value == 0 { Level::Low } else { Level::High })
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        for (line, pin) in &self.pins {
            if let Err(e) = pin.unexport() {
                warn!("unexport {} failed: {e}", line.name());
            }
        }
    }
}
