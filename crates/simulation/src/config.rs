//! Room configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub character: CharacterConfig,
    #[serde(default)]
    pub weapon: WeaponConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
}

/// A configuration value that would break the simulation contract.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("latency smoothing must be in (0, 1], got {0}")]
    Smoothing(f32),
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)?
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string; missing keys take defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_interval_ms == 0 {
            return Err(ConfigError::Zero("simulation.tick_interval_ms"));
        }
        if self.simulation.resync_interval_ticks == 0 {
            return Err(ConfigError::Zero("simulation.resync_interval_ticks"));
        }
        if self.pool.max_characters == 0 {
            return Err(ConfigError::Zero("pool.max_characters"));
        }
        if self.pool.max_projectiles == 0 {
            return Err(ConfigError::Zero("pool.max_projectiles"));
        }
        if self.character.input_buffer_capacity == 0 {
            return Err(ConfigError::Zero("character.input_buffer_capacity"));
        }
        if self.weapon.projectile_max_age <= 0.0 {
            return Err(ConfigError::Zero("weapon.projectile_max_age"));
        }
        if self.latency.probe_interval_ms == 0 {
            return Err(ConfigError::Zero("latency.probe_interval_ms"));
        }
        let s = self.latency.smoothing;
        if !(s > 0.0 && s <= 1.0) {
            return Err(ConfigError::Smoothing(s));
        }
        Ok(())
    }
}

/// Tick cadence and replication pacing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Room identifier passed to the replication gateway.
    #[serde(default = "default_room_id")]
    pub room_id: u32,
    /// Tick interval in milliseconds (50 = 20 Hz).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Republish projectile age every N ticks.
    #[serde(default = "default_resync_interval")]
    pub resync_interval_ticks: u64,
    /// Warn when a tick takes longer than this share of the interval.
    #[serde(default = "default_slow_tick_ratio")]
    pub slow_tick_warn_ratio: f64,
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            room_id: default_room_id(),
            tick_interval_ms: default_tick_interval(),
            resync_interval_ticks: default_resync_interval(),
            slow_tick_warn_ratio: default_slow_tick_ratio(),
        }
    }
}

fn default_room_id() -> u32 {
    1
}
fn default_tick_interval() -> u64 {
    50
}
fn default_resync_interval() -> u64 {
    10
}
fn default_slow_tick_ratio() -> f64 {
    0.9
}

/// Entity pool capacities. Small on purpose: exhaustion is expected.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,
    #[serde(default = "default_max_projectiles")]
    pub max_projectiles: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_characters: default_max_characters(),
            max_projectiles: default_max_projectiles(),
        }
    }
}

fn default_max_characters() -> usize {
    100
}
fn default_max_projectiles() -> usize {
    5
}

/// Character spawn and movement.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CharacterConfig {
    #[serde(default)]
    pub spawn_x: f32,
    #[serde(default)]
    pub spawn_y: f32,
    #[serde(default = "default_spawn_z")]
    pub spawn_z: f32,
    /// Movement speed in units per second.
    #[serde(default = "default_velocity")]
    pub velocity: f32,
    /// Turn rate in degrees per second.
    #[serde(default = "default_turn_rate")]
    pub turn_rate_deg: f32,
    /// Inputs buffered per character before the oldest is dropped.
    #[serde(default = "default_input_buffer_capacity")]
    pub input_buffer_capacity: usize,
}

impl CharacterConfig {
    pub fn spawn_position(&self) -> glam::Vec3 {
        glam::Vec3::new(self.spawn_x, self.spawn_y, self.spawn_z)
    }
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            spawn_x: 0.0,
            spawn_y: 0.0,
            spawn_z: default_spawn_z(),
            velocity: default_velocity(),
            turn_rate_deg: default_turn_rate(),
            input_buffer_capacity: default_input_buffer_capacity(),
        }
    }
}

fn default_spawn_z() -> f32 {
    2.0
}
fn default_velocity() -> f32 {
    8.0
}
fn default_turn_rate() -> f32 {
    90.0
}
fn default_input_buffer_capacity() -> usize {
    32
}

/// Weapon cooldown and the projectile it fires.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeaponConfig {
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    /// Type tag replicated as `t`.
    #[serde(default)]
    pub projectile_kind: u8,
    #[serde(default = "default_projectile_velocity")]
    pub projectile_velocity: f32,
    /// Seconds a projectile lives before it expires.
    #[serde(default = "default_projectile_max_age")]
    pub projectile_max_age: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown(),
            projectile_kind: 0,
            projectile_velocity: default_projectile_velocity(),
            projectile_max_age: default_projectile_max_age(),
        }
    }
}

fn default_cooldown() -> u64 {
    500
}
fn default_projectile_velocity() -> f32 {
    1.0
}
fn default_projectile_max_age() -> f32 {
    10.0
}

/// Round-trip probing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatencyConfig {
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u64,
    /// Weight of a fresh sample in the rolling estimate.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// An unanswered probe older than this is replaced by the next cycle.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl LatencyConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval(),
            smoothing: default_smoothing(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

fn default_probe_interval() -> u64 {
    4000
}
fn default_smoothing() -> f32 {
    0.25
}
fn default_probe_timeout() -> u64 {
    8000
}

/// Settings for the in-memory replication gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplicationConfig {
    /// Users within this planar distance observe an update.
    #[serde(default = "default_proximity_radius")]
    pub proximity_radius: f32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            proximity_radius: default_proximity_radius(),
        }
    }
}

fn default_proximity_radius() -> f32 {
    50.0
}
