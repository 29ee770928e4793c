//! Configuration management for Pipette GW
//!
//! Handles loading, parsing, and validation of the YAML configuration file.
//! Every field has a default so an empty file yields a working local setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub gamepad: GamepadConfig,
    #[serde(default)]
    pub actuator: ActuatorConfig,
}

/// Pub/sub transport configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BusConfig {
    /// Redis URL (e.g. `redis://127.0.0.1/`). When absent, an in-process bus is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_command_channel")]
    pub command_channel: String,
    #[serde(default = "default_feedback_channel")]
    pub feedback_channel: String,
}

/// Workspace bounds for the navigation target (deck coordinates)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct WorkspaceConfig {
    #[serde(default = "default_min_x")]
    pub min_x: i32,
    #[serde(default = "default_max_x")]
    pub max_x: i32,
    #[serde(default = "default_min_y")]
    pub min_y: i32,
    #[serde(default = "default_max_y")]
    pub max_y: i32,
}

/// Navigation and input normalization settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MotionConfig {
    /// Distance moved per tick along each axis
    #[serde(default = "default_step")]
    pub step: i32,
    /// Analog stick dead zone (absolute axis value)
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,
    /// Hat switch dead zone; 0 means any nonzero value is directional
    #[serde(default)]
    pub hat_deadzone: f32,
    /// Navigation loop interval
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Fixed z used for every navigation move
    #[serde(default = "default_travel_height")]
    pub travel_height: i32,
    #[serde(default = "default_start_x")]
    pub start_x: i32,
    #[serde(default = "default_start_y")]
    pub start_y: i32,
    /// Per-axis inversion, keyed by "x" / "y"
    #[serde(default)]
    pub invert: HashMap<String, bool>,
    #[serde(default)]
    pub block_policy: BlockPolicy,
    /// Upper bound on how long `until_feedback` keeps navigation blocked
    #[serde(default = "default_feedback_timeout_ms")]
    pub feedback_timeout_ms: u64,
    /// Adopt positions reported on the feedback channel as the new target
    #[serde(default)]
    pub sync_position: bool,
}

/// When the action dispatcher releases the navigation block
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Clear `blocked` as soon as the publish call returns
    #[default]
    ReleaseAfterPublish,
    /// Keep `blocked` until the next feedback message (or the timeout)
    UntilFeedback,
}

/// Gamepad configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GamepadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Case-insensitive substring of the gamepad name; first connected pad when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_match: Option<String>,
}

/// Actuator node settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ActuatorConfig {
    /// Gantry speed for `move_to` (mm/s)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Volume used when an aspirate/dispense command carries no volume (µL)
    #[serde(default = "default_volume")]
    pub default_volume: f64,
    /// Pipette capacity (µL)
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,
    #[serde(default = "default_trash_x")]
    pub trash_x: i32,
    #[serde(default = "default_trash_y")]
    pub trash_y: i32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: None,
            command_channel: default_command_channel(),
            feedback_channel: default_feedback_channel(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            min_x: default_min_x(),
            max_x: default_max_x(),
            min_y: default_min_y(),
            max_y: default_max_y(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            deadzone: default_deadzone(),
            hat_deadzone: 0.0,
            tick_ms: default_tick_ms(),
            travel_height: default_travel_height(),
            start_x: default_start_x(),
            start_y: default_start_y(),
            invert: HashMap::new(),
            block_policy: BlockPolicy::default(),
            feedback_timeout_ms: default_feedback_timeout_ms(),
            sync_position: false,
        }
    }
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            product_match: None,
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            default_volume: default_volume(),
            max_volume: default_max_volume(),
            trash_x: default_trash_x(),
            trash_y: default_trash_y(),
        }
    }
}

impl MotionConfig {
    /// Whether the given axis ("x" or "y") is inverted
    pub fn is_inverted(&self, axis: &str) -> bool {
        self.invert.get(axis).copied().unwrap_or(false)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.bus.command_channel.is_empty() {
            anyhow::bail!("bus.command_channel cannot be empty");
        }
        if self.bus.feedback_channel.is_empty() {
            anyhow::bail!("bus.feedback_channel cannot be empty");
        }
        if self.bus.command_channel == self.bus.feedback_channel {
            anyhow::bail!(
                "bus.command_channel and bus.feedback_channel must differ (both '{}')",
                self.bus.command_channel
            );
        }

        let ws = &self.workspace;
        if ws.min_x > ws.max_x {
            anyhow::bail!("workspace.min_x ({}) exceeds max_x ({})", ws.min_x, ws.max_x);
        }
        if ws.min_y > ws.max_y {
            anyhow::bail!("workspace.min_y ({}) exceeds max_y ({})", ws.min_y, ws.max_y);
        }

        let motion = &self.motion;
        if motion.step <= 0 {
            anyhow::bail!("motion.step must be positive (got {})", motion.step);
        }
        for (name, value) in [("deadzone", motion.deadzone), ("hat_deadzone", motion.hat_deadzone)] {
            if !(0.0..1.0).contains(&value) {
                anyhow::bail!("motion.{} must be in [0, 1) (got {})", name, value);
            }
        }
        if motion.tick_ms == 0 {
            anyhow::bail!("motion.tick_ms must be greater than zero");
        }
        if !(ws.min_x..=ws.max_x).contains(&motion.start_x)
            || !(ws.min_y..=ws.max_y).contains(&motion.start_y)
        {
            anyhow::bail!(
                "motion start position ({}, {}) lies outside the workspace",
                motion.start_x,
                motion.start_y
            );
        }
        for axis in motion.invert.keys() {
            if axis != "x" && axis != "y" {
                anyhow::bail!("motion.invert has unknown axis '{}' (expected x or y)", axis);
            }
        }

        let act = &self.actuator;
        if act.speed <= 0.0 {
            anyhow::bail!("actuator.speed must be positive");
        }
        if act.default_volume <= 0.0 || act.default_volume > act.max_volume {
            anyhow::bail!(
                "actuator.default_volume ({}) must be in (0, max_volume = {}]",
                act.default_volume,
                act.max_volume
            );
        }

        Ok(())
    }
}

// Default value functions
fn default_command_channel() -> String { "pipette.commands".to_string() }
fn default_feedback_channel() -> String { "pipette.feedback".to_string() }
fn default_min_x() -> i32 { 0 }
fn default_max_x() -> i32 { 400 }
fn default_min_y() -> i32 { 0 }
fn default_max_y() -> i32 { 400 }
fn default_step() -> i32 { 10 }
fn default_deadzone() -> f32 { 0.5 }
fn default_tick_ms() -> u64 { 1000 }
fn default_travel_height() -> i32 { 100 }
fn default_start_x() -> i32 { 100 }
fn default_start_y() -> i32 { 100 }
fn default_feedback_timeout_ms() -> u64 { 30_000 }
fn default_true() -> bool { true }
fn default_speed() -> f64 { 80.0 }
fn default_volume() -> f64 { 10.0 }
fn default_max_volume() -> f64 { 20.0 }
fn default_trash_x() -> i32 { 320 }
fn default_trash_y() -> i32 { 360 }
