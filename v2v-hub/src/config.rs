//! config.rs — Hub configuration
//!
//! Layering (later wins): built-in defaults → `v2v-hub.toml` → environment → CLI flags.
//! The file is optional; a missing file means defaults.

use std::path::Path;

use bsm_types::{AgentId, BSM_RATE_NORMAL, SHARE_SENSOR_DATA_DISTANCE, V2V_RANGE_MEDIUM};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── Network ───────────────────────────────────────────────────────────────────

/// Parameters fixed at coordinator construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Communication range (meters)
    pub max_range_m: f64,
    /// V2V cycle rate, independent of the motion source tick rate
    pub update_rate_hz: f64,
    pub cooperative_perception: bool,
    /// Close-range threshold for cooperative sharing (meters)
    pub share_distance_m: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_range_m: V2V_RANGE_MEDIUM,
            update_rate_hz: BSM_RATE_NORMAL,
            cooperative_perception: true,
            share_distance_m: SHARE_SENSOR_DATA_DISTANCE,
        }
    }
}

impl NetworkConfig {
    /// Defaults with a different range; the share distance is capped at half the range.
    pub fn with_range(max_range_m: f64) -> Self {
        Self {
            max_range_m,
            share_distance_m: SHARE_SENSOR_DATA_DISTANCE.min(max_range_m / 2.0),
            ..Default::default()
        }
    }

    /// Override the range. A share distance that no longer fits below it is capped
    /// the same way `with_range` does.
    pub fn set_range(&mut self, max_range_m: f64) {
        self.max_range_m = max_range_m;
        if self.share_distance_m >= max_range_m {
            self.share_distance_m = SHARE_SENSOR_DATA_DISTANCE.min(max_range_m / 2.0);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.update_rate_hz.is_finite() && self.update_rate_hz > 0.0) {
            return Err(ConfigError::InvalidUpdateRate(self.update_rate_hz));
        }
        if !(self.max_range_m.is_finite() && self.max_range_m > 0.0) {
            return Err(ConfigError::InvalidRange(self.max_range_m));
        }
        if !(self.share_distance_m < self.max_range_m) {
            return Err(ConfigError::ShareDistanceTooLarge {
                share_m: self.share_distance_m,
                range_m: self.max_range_m,
            });
        }
        Ok(())
    }

    /// Minimum sim-time spacing between performed updates (seconds).
    pub fn update_interval_s(&self) -> f64 {
        1.0 / self.update_rate_hz
    }
}

// ── Simulation / server ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Motion source tick rate (Hz)
    pub tick_rate_hz: f64,
    /// Scenario preset name (`highway`, `intersection`, `convoy`, `head_on`, `dropout`)
    pub scenario: String,
    pub n_vehicles: usize,
    pub seed: u64,
    /// Sim-time multiplier (1.0 = real-time)
    pub speed: f64,
    /// Agent whose one-line status is logged; first registered agent when unset
    pub ego_agent_id: Option<AgentId>,
    pub status_interval_s: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            scenario: "highway".into(),
            n_vehicles: 12,
            seed: 42,
            speed: 1.0,
            ego_agent_id: None,
            status_interval_s: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8001 }
    }
}

// ── Full config ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub network: NetworkConfig,
    pub simulation: SimulationConfig,
    pub server: ServerConfig,
}

impl HubConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Overlay `V2V_PORT`, `V2V_MAX_RANGE_M`, `V2V_SHARE_DISTANCE_M` and `V2V_UPDATE_RATE_HZ`.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("V2V_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(range) = lookup("V2V_MAX_RANGE_M").and_then(|v| v.parse().ok()) {
            self.network.set_range(range);
        }
        if let Some(share) = lookup("V2V_SHARE_DISTANCE_M").and_then(|v| v.parse().ok()) {
            self.network.share_distance_m = share;
        }
        if let Some(rate) = lookup("V2V_UPDATE_RATE_HZ").and_then(|v| v.parse().ok()) {
            self.network.update_rate_hz = rate;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        let sim = &self.simulation;
        for (field, value) in [
            ("tick_rate_hz", sim.tick_rate_hz),
            ("speed", sim.speed),
            ("status_interval_s", sim.status_interval_s),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSimulation { field, value });
            }
        }
        Ok(())
    }
}
