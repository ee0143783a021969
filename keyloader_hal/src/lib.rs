//! Keyloader HAL
//!
//! GPIO abstraction for the key-loader rig with pluggable backends:
//!
//! - [`sim::SimGpio`] - in-process simulator with scripted sensor
//!   triggers, the default for development and every test
//! - `sysfs::SysfsGpio` - Raspberry Pi sysfs backend, behind the
//!   `gpio-hardware` feature
//!
//! The motion engine only ever sees the [`Gpio`] and [`Delay`] traits
//! plus the logical [`lines::Line`] names; pin numbering and electrical
//! details stay behind this crate.

pub mod lines;
pub mod sim;
#[cfg(feature = "gpio-hardware")]
pub mod sysfs;

use keyloader_common::error::GpioError;
use lines::Line;
use std::time::Duration;

/// Electrical level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Driven/read low.
    Low,
    /// Driven/read high.
    High,
}

impl Level {
    /// Inverted level.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// Digital pin access keyed by logical line.
///
/// `read` is valid on every line (reading an output returns the last
/// driven level); `write` is a caller error on input lines and backends
/// may reject it.
pub trait Gpio {
    /// Drive an output line.
    fn write(&mut self, line: Line, level: Level) -> Result<(), GpioError>;

    /// Sample a line. Never cached; every call re-samples.
    fn read(&mut self, line: Line) -> Result<Level, GpioError>;
}

/// Timed suspension between pulse edges and phases.
///
/// Best-effort, cooperative: a sleep is not cancellable mid-delay. The
/// simulation backend accumulates instead of sleeping so tests run at
/// full speed.
pub trait Delay {
    /// Suspend for the given duration.
    fn sleep(&mut self, duration: Duration);
}

/// [`Delay`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
