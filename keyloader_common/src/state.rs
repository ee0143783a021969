//! State enums and report types for the cycle engine.
//!
//! All state enums use `#[repr(u8)]` with `from_u8` constructors, the
//! convention used for every machine-facing enum in this workspace.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Machine lifecycle state.
///
/// `Running` is only reachable from `Ready` (rotary axis homed) and only
/// while no other motion operation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MachineState {
    /// Powered up, rotary axis not yet homed.
    Idle = 0,
    /// Homing sequence in progress.
    Homing = 1,
    /// Homed, ready to start a cycle.
    Ready = 2,
    /// A cycle or jog is executing.
    Running = 3,
    /// Last operation faulted; requires homing or operator override.
    Faulted = 4,
}

impl MachineState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Homing),
            2 => Some(Self::Ready),
            3 => Some(Self::Running),
            4 => Some(Self::Faulted),
            _ => None,
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Slider travel direction, one limit switch per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SliderDirection {
    /// Retracted end of travel.
    Min = 0,
    /// Extended end of travel.
    Max = 1,
}

impl std::fmt::Display for SliderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
        }
    }
}

bitflags! {
    /// Snapshot of the four binary sensors, normalized to asserted=set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SensorFlags: u8 {
        /// Rotary home (hall) sensor.
        const HALL       = 0x01;
        /// Key-presence (inductive) sensor.
        const INDUCTIVE  = 0x02;
        /// Slider retracted limit switch.
        const SLIDER_MIN = 0x04;
        /// Slider extended limit switch.
        const SLIDER_MAX = 0x08;
    }
}

/// Outcome of one visited station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationOutcome {
    /// Indexed successfully; rig has no slider, nothing to trigger.
    Moved,
    /// Key present, slider extend/retract sub-cycle completed.
    KeyTriggered,
    /// No key present, station skipped.
    KeySkipped,
    /// Station failed; the cycle aborted here.
    Faulted,
}

/// Reason a cycle stopped before visiting every station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Rotary motor stalled mid-move.
    Stall,
    /// Hall sensor failed to confirm the station position.
    PositionMismatch,
    /// Slider never reached a limit switch.
    SliderFault,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stall => write!(f, "stall"),
            Self::PositionMismatch => write!(f, "position mismatch"),
            Self::SliderFault => write!(f, "slider fault"),
        }
    }
}

/// Terminal summary of a cycle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSummary {
    /// Every station was visited.
    Completed,
    /// The loop stopped early for the recorded reason.
    Aborted(AbortReason),
}

/// Record for one station visited during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// 1-based station index.
    pub station: u32,
    /// Target angle for this station [deg, 0..360).
    pub target_deg: f64,
    /// What happened at this station.
    pub outcome: StationOutcome,
}

/// Ordered per-station outcomes plus the terminal summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// One record per station the loop reached, in visit order.
    pub stations: Vec<StationRecord>,
    /// Terminal summary.
    pub summary: CycleSummary,
}

impl CycleReport {
    /// Returns true if the cycle visited every station.
    #[inline]
    pub fn completed(&self) -> bool {
        self.summary == CycleSummary::Completed
    }

    /// Returns the abort reason, if the cycle stopped early.
    #[inline]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self.summary {
            CycleSummary::Completed => None,
            CycleSummary::Aborted(reason) => Some(reason),
        }
    }
}

/// Pure status query result, relayed verbatim by the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Tracked rotary angle [deg, 0..360).
    pub angle_deg: f64,
    /// Rotary axis homed flag.
    pub homed: bool,
    /// A motion operation is in flight.
    pub running: bool,
    /// Machine lifecycle state.
    pub state: MachineState,
    /// Sensor snapshot (stale while running).
    #[serde(with = "sensor_flags_serde")]
    pub sensors: SensorFlags,
    /// Operator-facing message for the last transition.
    pub message: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            angle_deg: 0.0,
            homed: false,
            running: false,
            state: MachineState::Idle,
            sensors: SensorFlags::empty(),
            message: "machine needs to be homed".to_string(),
        }
    }
}

/// Serde adapter storing `SensorFlags` as its raw bits.
mod sensor_flags_serde {
    use super::SensorFlags;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flags: &SensorFlags, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(flags.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SensorFlags, D::Error> {
        Ok(SensorFlags::from_bits_truncate(u8::deserialize(d)?))
    }
}
