//! In-process GPIO simulator.
//!
//! `SimGpio` is a cheaply clonable handle over shared state, so a test
//! can keep one handle for scripting and inspection while the motion
//! engine owns another. Sensor behavior is scripted with triggers keyed
//! on step-pulse counts: "after N rising edges on this step line, drive
//! that input to this level". Inputs default to high (deasserted, the
//! rig is wired active-low).

use crate::lines::Line;
use crate::{Delay, Gpio, Level};
use keyloader_common::error::GpioError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::trace;

/// One-shot scripted input change.
#[derive(Debug, Clone)]
struct Trigger {
    /// Step line whose rising edges are counted.
    counted: Line,
    /// Edge count at which the trigger fires.
    at: u64,
    /// Input line to change.
    set: Line,
    /// Level to drive it to.
    to: Level,
    fired: bool,
}

#[derive(Debug, Default)]
struct SimState {
    outputs: HashMap<Line, Level>,
    inputs: HashMap<Line, Level>,
    rising_edges: HashMap<Line, u64>,
    triggers: Vec<Trigger>,
}

/// Simulated GPIO backend (shared handle).
#[derive(Debug, Clone)]
pub struct SimGpio {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimGpio {
    /// New simulator: outputs low except enables (high = disabled),
    /// all inputs high (deasserted).
    pub fn new() -> Self {
        let mut state = SimState::default();
        for line in Line::ALL {
            if line.is_output() {
                let idle = match line {
                    Line::RotaryEnable | Line::SliderEnable => Level::High,
                    _ => Level::Low,
                };
                state.outputs.insert(line, idle);
            } else {
                state.inputs.insert(line, Level::High);
            }
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive an input line directly (electrical level).
    pub fn set_input(&self, line: Line, level: Level) {
        self.lock().inputs.insert(line, level);
    }

    /// Assert a sensor (drive its input low).
    pub fn assert_sensor(&self, line: Line) {
        self.set_input(line, Level::Low);
    }

    /// Deassert a sensor (drive its input high).
    pub fn deassert_sensor(&self, line: Line) {
        self.set_input(line, Level::High);
    }

    /// Script a one-shot input change after `at` rising edges on a step
    /// line. Count 0 fires before the first pulse completes.
    pub fn trigger_after_pulses(&self, counted: Line, at: u64, set: Line, to: Level) {
        self.lock().triggers.push(Trigger {
            counted,
            at,
            set,
            to,
            fired: false,
        });
    }

    /// Rising edges seen on a line so far.
    pub fn pulses(&self, line: Line) -> u64 {
        self.lock().rising_edges.get(&line).copied().unwrap_or(0)
    }

    /// Last driven level of an output line.
    pub fn output(&self, line: Line) -> Level {
        self.lock().outputs.get(&line).copied().unwrap_or(Level::Low)
    }
}

impl Gpio for SimGpio {
    fn write(&mut self, line: Line, level: Level) -> Result<(), GpioError> {
        if !line.is_output() {
            return Err(GpioError::Io {
                line: line.name(),
                message: "line is an input".into(),
            });
        }
        let mut state = self.lock();
        let SimState {
            outputs,
            inputs,
            rising_edges,
            triggers,
        } = &mut *state;
        let previous = outputs.insert(line, level);
        if previous == Some(Level::Low) && level == Level::High {
            let count = rising_edges.entry(line).or_insert(0);
            *count += 1;
            let count = *count;
            trace!(line = line.name(), count, "rising edge");
            for trigger in triggers {
                if !trigger.fired && trigger.counted == line && count >= trigger.at {
                    trigger.fired = true;
                    inputs.insert(trigger.set, trigger.to);
                    trace!(line = trigger.set.name(), "trigger fired");
                    break;
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, line: Line) -> Result<Level, GpioError> {
        let state = self.lock();
        if line.is_output() {
            Ok(state.outputs.get(&line).copied().unwrap_or(Level::Low))
        } else {
            Ok(state.inputs.get(&line).copied().unwrap_or(Level::High))
        }
    }
}

/// [`Delay`] that accumulates instead of sleeping (shared handle).
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    total: Arc<Mutex<Duration>>,
}

impl SimDelay {
    /// New zeroed accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total simulated time slept so far.
    pub fn elapsed(&self) -> Duration {
        *self.total.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Delay for SimDelay {
    fn sleep(&mut self, duration: Duration) {
        let mut total = self.total.lock().unwrap_or_else(PoisonError::into_inner);
        *total += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_default_deasserted() {
        let mut sim = SimGpio::new();
        assert_eq!(sim.read(Line::Hall).unwrap(), Level::High);
        assert_eq!(sim.read(Line::RotaryAlarm).unwrap(), Level::High);
        // Enables idle disabled (high), step lines idle low.
        assert_eq!(sim.output(Line::RotaryEnable), Level::High);
        assert_eq!(sim.output(Line::RotaryStep), Level::Low);
    }

    #[test]
    fn rising_edges_counted() {
        let mut sim = SimGpio::new();
        for _ in 0..3 {
            sim.write(Line::RotaryStep, Level::High).unwrap();
            sim.write(Line::RotaryStep, Level::Low).unwrap();
        }
        // Re-driving high from high is not an edge.
        sim.write(Line::RotaryStep, Level::High).unwrap();
        sim.write(Line::RotaryStep, Level::High).unwrap();
        assert_eq!(sim.pulses(Line::RotaryStep), 4);
    }

    #[test]
    fn trigger_fires_once_at_count() {
        let mut sim = SimGpio::new();
        sim.trigger_after_pulses(Line::RotaryStep, 2, Line::Hall, Level::Low);

        sim.write(Line::RotaryStep, Level::High).unwrap();
        sim.write(Line::RotaryStep, Level::Low).unwrap();
        assert_eq!(sim.read(Line::Hall).unwrap(), Level::High);

        sim.write(Line::RotaryStep, Level::High).unwrap();
        sim.write(Line::RotaryStep, Level::Low).unwrap();
        assert_eq!(sim.read(Line::Hall).unwrap(), Level::Low);

        // Manual deassert is not undone by the spent trigger.
        sim.deassert_sensor(Line::Hall);
        sim.write(Line::RotaryStep, Level::High).unwrap();
        sim.write(Line::RotaryStep, Level::Low).unwrap();
        assert_eq!(sim.read(Line::Hall).unwrap(), Level::High);
    }

    #[test]
    fn writing_an_input_is_rejected() {
        let mut sim = SimGpio::new();
        assert!(sim.write(Line::Hall, Level::Low).is_err());
    }

    #[test]
    fn sim_delay_accumulates() {
        let mut delay = SimDelay::new();
        delay.sleep(Duration::from_millis(100));
        delay.sleep(Duration::from_micros(500));
        assert_eq!(delay.elapsed(), Duration::from_micros(100_500));
    }
}
