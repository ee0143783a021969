//! Logical line names and their BCM pin mapping.
//!
//! Sensors and alarm inputs are wired active-low (internal pull-ups,
//! asserted = low). Motor enable lines are active-low as well
//! (enabled = low), the convention of the MKS SERVO42C and most stepper
//! drivers.

/// Logical GPIO lines of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Rotary motor step pulse output.
    RotaryStep,
    /// Rotary motor direction output.
    RotaryDir,
    /// Rotary motor enable output (active-low).
    RotaryEnable,
    /// Rotary driver stall/fault input (active-low).
    RotaryAlarm,
    /// Rotary home hall sensor input (active-low).
    Hall,
    /// Key-presence inductive sensor input (active-low).
    Inductive,
    /// Slider motor step pulse output.
    SliderStep,
    /// Slider motor direction output.
    SliderDir,
    /// Slider motor enable output (active-low).
    SliderEnable,
    /// Slider retracted limit switch input (active-low).
    SliderMin,
    /// Slider extended limit switch input (active-low).
    SliderMax,
}

impl Line {
    /// Every logical line, outputs first.
    pub const ALL: [Line; 11] = [
        Line::RotaryStep,
        Line::RotaryDir,
        Line::RotaryEnable,
        Line::SliderStep,
        Line::SliderDir,
        Line::SliderEnable,
        Line::RotaryAlarm,
        Line::Hall,
        Line::Inductive,
        Line::SliderMin,
        Line::SliderMax,
    ];

    /// True for lines the controller drives.
    #[inline]
    pub const fn is_output(self) -> bool {
        matches!(
            self,
            Line::RotaryStep
                | Line::RotaryDir
                | Line::RotaryEnable
                | Line::SliderStep
                | Line::SliderDir
                | Line::SliderEnable
        )
    }

    /// Stable name for logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Line::RotaryStep => "rotary_step",
            Line::RotaryDir => "rotary_dir",
            Line::RotaryEnable => "rotary_enable",
            Line::RotaryAlarm => "rotary_alarm",
            Line::Hall => "hall",
            Line::Inductive => "inductive",
            Line::SliderStep => "slider_step",
            Line::SliderDir => "slider_dir",
            Line::SliderEnable => "slider_enable",
            Line::SliderMin => "slider_min",
            Line::SliderMax => "slider_max",
        }
    }
}

/// BCM pin numbers for each logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMap {
    /// Rotary step pin.
    pub rotary_step: u64,
    /// Rotary direction pin.
    pub rotary_dir: u64,
    /// Rotary enable pin.
    pub rotary_enable: u64,
    /// Rotary alarm pin.
    pub rotary_alarm: u64,
    /// Hall sensor pin.
    pub hall: u64,
    /// Inductive sensor pin.
    pub inductive: u64,
    /// Slider step pin.
    pub slider_step: u64,
    /// Slider direction pin.
    pub slider_dir: u64,
    /// Slider enable pin.
    pub slider_enable: u64,
    /// Slider min limit pin.
    pub slider_min: u64,
    /// Slider max limit pin.
    pub slider_max: u64,
}

impl Default for PinMap {
    /// Wiring of the reference rig.
    fn default() -> Self {
        Self {
            rotary_step: 20,
            rotary_dir: 21,
            rotary_enable: 22,
            rotary_alarm: 16,
            hall: 26,
            inductive: 19,
            slider_step: 23,
            slider_dir: 24,
            slider_enable: 25,
            slider_min: 13,
            slider_max: 12,
        }
    }
}

impl PinMap {
    /// BCM number for a logical line.
    pub const fn bcm(&self, line: Line) -> u64 {
        match line {
            Line::RotaryStep => self.rotary_step,
            Line::RotaryDir => self.rotary_dir,
            Line::RotaryEnable => self.rotary_enable,
            Line::RotaryAlarm => self.rotary_alarm,
            Line::Hall => self.hall,
            Line::Inductive => self.inductive,
            Line::SliderStep => self.slider_step,
            Line::SliderDir => self.slider_dir,
            Line::SliderEnable => self.slider_enable,
            Line::SliderMin => self.slider_min,
            Line::SliderMax => self.slider_max,
        }
    }
}
