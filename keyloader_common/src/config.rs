//! Rig configuration: loading, validation and persistence.
//!
//! A single `rig.toml` with `[rotary]`, `[slider]` and `[cycle]` tables.
//! Every field carries a default matching the physical rig (MKS SERVO42C
//! on a 1.8 deg NEMA 17 at 16x microstepping), so an empty file is a
//! valid configuration. `load_or_create` writes the defaults back when
//! the file is absent, which is how operators get a template to edit.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Error type for configuration operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("configuration I/O error: {0}")]
    Io(String),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Rotary indexing table parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotaryConfig {
    /// Stepper pulses per full revolution (driver DIP-switch dependent).
    #[serde(default = "default_pulses_per_rev")]
    pub pulses_per_rev: u32,
    /// Move speed, 0-100. 0 falls back to a fixed slow delay.
    #[serde(default = "default_speed")]
    pub speed: u8,
    /// Acceleration ramp length [pulses], clamped to half the move.
    #[serde(default = "default_ramp_steps")]
    pub accel_steps: u32,
    /// Deceleration ramp length [pulses], clamped to half the move.
    #[serde(default = "default_ramp_steps")]
    pub decel_steps: u32,
    /// Settle pause after each indexing move, before the hall check [ms].
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_pulses_per_rev() -> u32 {
    3200
}
fn default_speed() -> u8 {
    50
}
fn default_ramp_steps() -> u32 {
    100
}
fn default_settle_ms() -> u64 {
    500
}

impl Default for RotaryConfig {
    fn default() -> Self {
        Self {
            pulses_per_rev: default_pulses_per_rev(),
            speed: default_speed(),
            accel_steps: default_ramp_steps(),
            decel_steps: default_ramp_steps(),
            settle_ms: default_settle_ms(),
        }
    }
}

/// Linear slider parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SliderConfig {
    /// Whether this rig has a slider rail wired at all. Resolved once at
    /// startup into the rig profile; never probed per call.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Runaway guard: hard ceiling on pulses per limit-seeking move.
    #[serde(default = "default_slider_max_pulses")]
    pub max_pulses: u32,
}

fn default_true() -> bool {
    true
}
fn default_slider_max_pulses() -> u32 {
    20_000
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_pulses: default_slider_max_pulses(),
        }
    }
}

/// Cycle parameters, immutable for the duration of one cycle run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleConfig {
    /// Rotary step per station [deg].
    #[serde(default = "default_step_degrees")]
    pub step_degrees: f64,
    /// Pause after slider retraction, before the next station [ms].
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
    /// Per-pulse half-period for slider retraction [s].
    #[serde(default = "default_slider_delay")]
    pub slider_in_delay_s: f64,
    /// Per-pulse half-period for slider extension [s].
    #[serde(default = "default_slider_delay")]
    pub slider_out_delay_s: f64,
    /// Number of stations per cycle.
    #[serde(default = "default_cycle_count")]
    pub cycle_count: u32,
}

fn default_step_degrees() -> f64 {
    36.0
}
fn default_dwell_ms() -> u64 {
    1000
}
fn default_slider_delay() -> f64 {
    0.0008
}
fn default_cycle_count() -> u32 {
    10
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            step_degrees: default_step_degrees(),
            dwell_ms: default_dwell_ms(),
            slider_in_delay_s: default_slider_delay(),
            slider_out_delay_s: default_slider_delay(),
            cycle_count: default_cycle_count(),
        }
    }
}

/// Complete rig configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigConfig {
    /// Rotary indexing table.
    #[serde(default)]
    pub rotary: RotaryConfig,
    /// Linear slider.
    #[serde(default)]
    pub slider: SliderConfig,
    /// Cycle parameters.
    #[serde(default)]
    pub cycle: CycleConfig,
}

impl RigConfig {
    /// Semantic validation. Type/range checking happens here, once, so
    /// the motion engine can treat the values as opaque validated inputs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotary.pulses_per_rev == 0 {
            return Err(ConfigError::Validation(
                "rotary.pulses_per_rev must be > 0".into(),
            ));
        }
        if self.rotary.speed > 100 {
            return Err(ConfigError::Validation(
                "rotary.speed must be in 0..=100".into(),
            ));
        }
        if !self.cycle.step_degrees.is_finite() || self.cycle.step_degrees == 0.0 {
            return Err(ConfigError::Validation(
                "cycle.step_degrees must be finite and non-zero".into(),
            ));
        }
        if self.cycle.slider_in_delay_s <= 0.0 || self.cycle.slider_out_delay_s <= 0.0 {
            return Err(ConfigError::Validation(
                "cycle slider delays must be > 0".into(),
            ));
        }
        if self.slider.max_pulses == 0 {
            return Err(ConfigError::Validation(
                "slider.max_pulses must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a rig configuration TOML.
pub fn load_config(path: &Path) -> Result<RigConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let config: RigConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    debug!("loaded rig config from {}", path.display());
    Ok(config)
}

/// Persist a rig configuration as TOML.
pub fn save_config(path: &Path, config: &RigConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let text = toml::to_string_pretty(config).map_err(|e| ConfigError::Io(e.to_string()))?;
    fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))?;
    debug!("saved rig config to {}", path.display());
    Ok(())
}

/// Load the configuration, writing defaults when the file is absent.
pub fn load_or_create(path: &Path) -> Result<RigConfig, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let config = RigConfig::default();
        save_config(path, &config)?;
        info!("no config at {}, wrote defaults", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_rig() {
        let config = RigConfig::default();
        assert_eq!(config.rotary.pulses_per_rev, 3200);
        assert_eq!(config.rotary.speed, 50);
        assert_eq!(config.cycle.step_degrees, 36.0);
        assert_eq!(config.cycle.cycle_count, 10);
        assert_eq!(config.cycle.dwell_ms, 1000);
        assert_eq!(config.slider.max_pulses, 20_000);
        assert!(config.slider.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: RigConfig = toml::from_str("").unwrap();
        assert_eq!(config, RigConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config: RigConfig = toml::from_str(
            r#"
[rotary]
pulses_per_rev = 6400

[cycle]
cycle_count = 3
"#,
        )
        .unwrap();
        assert_eq!(config.rotary.pulses_per_rev, 6400);
        assert_eq!(config.cycle.cycle_count, 3);
        // Everything not named keeps its default.
        assert_eq!(config.rotary.speed, 50);
        assert_eq!(config.cycle.step_degrees, 36.0);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<RigConfig, _> = toml::from_str(
            r#"
[rotary]
puises_per_rev = 6400
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = RigConfig::default();
        config.rotary.pulses_per_rev = 0;
        assert!(config.validate().is_err());

        let mut config = RigConfig::default();
        config.rotary.speed = 101;
        assert!(config.validate().is_err());

        let mut config = RigConfig::default();
        config.cycle.step_degrees = 0.0;
        assert!(config.validate().is_err());

        let mut config = RigConfig::default();
        config.cycle.slider_in_delay_s = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rig.toml");

        let mut config = RigConfig::default();
        config.cycle.cycle_count = 7;
        config.slider.enabled = false;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rig.toml");
        assert!(!path.exists());

        let config = load_or_create(&path).unwrap();
        assert_eq!(config, RigConfig::default());
        assert!(path.exists());

        // Second call reads the file it just wrote.
        let again = load_or_create(&path).unwrap();
        assert_eq!(again, config);
    }
}
