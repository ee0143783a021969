//! Keyloader Motion Engine
//!
//! The motion and cycle-orchestration core of the key loader: homing the
//! rotary indexing table against its hall sensor, ramped point-to-point
//! rotary moves with per-pulse stall detection, bounded slider moves to
//! hard limits, and the fault-aware multi-station cycle that sequences
//! all of it.
//!
//! Everything here is synchronous and blocking: a move call does not
//! return until every pulse completed or a fault was detected, and the
//! two axes are never actuated concurrently. Position is inferred purely
//! from issued pulses plus sensor confirmation; there is no encoder.
//!
//! ## Module structure
//!
//! - [`pulse`] - step pulse and enable-line primitives
//! - [`sensors`] - polled, normalized sensor reads
//! - [`rotary`] - homing and ramped relative moves
//! - [`slider`] - limit-seeking bounded moves
//! - [`controller`] - busy lock, state machine, cycle loop, status

pub mod controller;
pub mod pulse;
pub mod rotary;
pub mod sensors;
pub mod slider;

pub use controller::Controller;

use keyloader_hal::{Delay, Gpio};

/// Bundle of the GPIO backend and its delay source.
///
/// Owned exclusively by the controller; axes borrow it for the duration
/// of one blocking operation. This is what keeps the enable and step
/// lines single-writer.
pub struct Io<G: Gpio, D: Delay> {
    /// GPIO backend.
    pub gpio: G,
    /// Timed suspension source.
    pub delay: D,
}

impl<G: Gpio, D: Delay> Io<G, D> {
    /// Bundle a backend with its delay source.
    pub fn new(gpio: G, delay: D) -> Self {
        Self { gpio, delay }
    }
}
