//! scenarios.rs — Traffic layouts and injectable faults for the built-in motion source
//!
//! Each layout stresses a different part of the V2V engine:
//! crossing streams produce high threat levels, platoons produce dense
//! neighbor sets, and dropout exercises the "missing from snapshot" path.
//! Scenarios are switchable at runtime via the hub's WebSocket control channel.

use std::fmt;
use std::str::FromStr;

use bsm_types::ActorId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    /// Three lanes, same direction, mixed speeds
    #[default]
    Highway,
    /// Two streams crossing at the origin (east-bound and north-bound)
    Intersection,
    /// Single-lane platoon with an emergency vehicle closing from the tail
    Convoy,
    /// Two opposing lanes
    HeadOn,
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Highway => "highway",
            Self::Intersection => "intersection",
            Self::Convoy => "convoy",
            Self::HeadOn => "head_on",
        };
        f.write_str(s)
    }
}

impl FromStr for ScenarioType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "highway" => Ok(Self::Highway),
            "intersection" => Ok(Self::Intersection),
            "convoy" => Ok(Self::Convoy),
            "head_on" | "headon" => Ok(Self::HeadOn),
            other => Err(format!("unknown scenario '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    pub layout: ScenarioType,
    pub n_vehicles: usize,
    /// Actors that periodically vanish from the snapshot
    pub dropout_actor_ids: Vec<ActorId>,
    pub dropout_duration_ticks: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            layout: ScenarioType::Highway,
            n_vehicles: 12,
            dropout_actor_ids: vec![],
            dropout_duration_ticks: 10,
        }
    }
}

impl ScenarioConfig {
    pub fn new(layout: ScenarioType, n_vehicles: usize) -> Self {
        Self { layout, n_vehicles, ..Default::default() }
    }

    /// Dropped for `dropout_duration_ticks`, then visible for 40 ticks, repeating.
    pub fn is_actor_dropped(&self, actor_id: ActorId, tick: u64) -> bool {
        if !self.dropout_actor_ids.contains(&actor_id) { return false; }
        let period = self.dropout_duration_ticks as u64 + 40;
        tick % period < self.dropout_duration_ticks as u64
    }
}

/// Predefined presets selectable from the CLI or the web control channel.
pub fn preset(name: &str, n_vehicles: usize) -> Option<ScenarioConfig> {
    if name.eq_ignore_ascii_case("dropout") {
        return Some(preset_dropout(n_vehicles));
    }
    name.parse::<ScenarioType>().ok().map(|layout| ScenarioConfig::new(layout, n_vehicles))
}

/// Highway traffic where two actors (first and mid-field) drop out periodically.
pub fn preset_dropout(n_vehicles: usize) -> ScenarioConfig {
    let first = crate::vehicle_sim::FIRST_ACTOR_ID;
    ScenarioConfig {
        dropout_actor_ids: vec![first, first + (n_vehicles as ActorId) / 2],
        dropout_duration_ticks: 10,
        ..ScenarioConfig::new(ScenarioType::Highway, n_vehicles)
    }
}
