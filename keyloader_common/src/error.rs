//! Error taxonomy for the keyloader core.
//!
//! Two layers: `GpioError` for backend-level pin access faults, and
//! `MotionError` for everything the motion engine reports to an operator.
//! All hardware faults abort the current operation, never the process,
//! and nothing here retries automatically.

use thiserror::Error;

use crate::state::SliderDirection;

/// Error types for GPIO backend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpioError {
    /// Backend initialization failed (export, direction setup, ...).
    #[error("GPIO initialization failed: {0}")]
    InitFailed(String),

    /// A logical line has no pin mapping in this backend.
    #[error("GPIO line '{0}' is not mapped")]
    UnmappedLine(&'static str),

    /// Read or write on an exported pin failed.
    #[error("GPIO I/O error on line '{line}': {message}")]
    Io {
        /// Logical line name.
        line: &'static str,
        /// Underlying error text.
        message: String,
    },
}

/// Motion-level faults surfaced by the axes and the cycle controller.
///
/// Every variant is fatal to the *current* operation only. The motor
/// enable state after a fault is operation-specific: homing failure
/// disables the rotary motor, a stall leaves it enabled (holding torque
/// for inspection).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// Hall sensor never asserted within the homing travel budget.
    /// Requires operator intervention before a retry is meaningful.
    #[error("homing failed: hall sensor not detected within {budget} pulses")]
    HomingFailed {
        /// Pulse budget that was exhausted (1.5 revolutions).
        budget: u32,
    },

    /// Alarm line asserted during a rotary move. The tracked angle is
    /// left unmodified; actual position is unknown.
    #[error("motor stalled after {issued} of {total} pulses")]
    Stall {
        /// Pulses issued before the alarm asserted.
        issued: u32,
        /// Pulses the move would have issued.
        total: u32,
    },

    /// Post-move sensor check failed to confirm the expected position.
    #[error("position mismatch: hall sensor not confirmed at {angle_deg}\u{b0}")]
    PositionMismatch {
        /// Tracked angle at the time of the failed check.
        angle_deg: f64,
    },

    /// Slider pulse budget exhausted before reaching a limit switch.
    #[error("slider did not reach the {direction} limit within {budget} pulses")]
    SliderTimeout {
        /// Travel direction of the failed move.
        direction: SliderDirection,
        /// Exhausted pulse budget.
        budget: u32,
    },

    /// Another motion operation is in flight. Rejected synchronously,
    /// no queueing, no partial effect.
    #[error("busy: another motion operation is in progress")]
    Busy,

    /// A cycle was requested before the rotary axis was homed.
    #[error("rotary axis is not homed")]
    NotHomed,

    /// Backend-level pin access fault.
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

impl MotionError {
    /// Returns true for faults raised by hardware sensing (stall, missed
    /// sensor, limit timeout) as opposed to request-level rejections.
    #[inline]
    pub const fn is_hardware_fault(&self) -> bool {
        matches!(
            self,
            Self::HomingFailed { .. }
                | Self::Stall { .. }
                | Self::PositionMismatch { .. }
                | Self::SliderTimeout { .. }
                | Self::Gpio(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = MotionError::HomingFailed { budget: 4800 };
        assert!(format!("{e}").contains("4800"));

        let e = MotionError::Stall {
            issued: 41,
            total: 320,
        };
        let msg = format!("{e}");
        assert!(msg.contains("41") && msg.contains("320"));

        let e = MotionError::SliderTimeout {
            direction: SliderDirection::Max,
            budget: 5,
        };
        assert!(format!("{e}").contains("max"));
    }

    #[test]
    fn hardware_fault_classification() {
        assert!(MotionError::HomingFailed { budget: 1 }.is_hardware_fault());
        assert!(MotionError::Stall { issued: 0, total: 1 }.is_hardware_fault());
        assert!(!MotionError::Busy.is_hardware_fault());
        assert!(!MotionError::NotHomed.is_hardware_fault());
    }

    #[test]
    fn gpio_error_converts() {
        let g = GpioError::UnmappedLine("hall");
        let m: MotionError = g.clone().into();
        assert_eq!(m, MotionError::Gpio(g));
    }
}
