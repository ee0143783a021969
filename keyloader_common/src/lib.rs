//! Keyloader Common Library
//!
//! Shared types for the keyloader workspace: the motion error taxonomy,
//! machine/cycle state enums, sensor flags, cycle reports, and TOML
//! configuration loading/saving for the rig.
//!
//! # Module Structure
//!
//! - [`error`] - `GpioError` and `MotionError` taxonomy
//! - [`state`] - Machine state, station outcomes, sensor flags, reports
//! - [`config`] - `rig.toml` loading, validation and persistence

pub mod config;
pub mod error;
pub mod state;
