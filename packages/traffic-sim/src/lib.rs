//! # traffic-sim
//!
//! Built-in motion source for the V2V hub: a seeded kinematic road-traffic
//! simulator that emits one `MotionSnapshot` per tick.

pub mod scenarios;
pub mod vehicle_sim;

pub use scenarios::{preset, preset_dropout, ScenarioConfig, ScenarioType};
pub use vehicle_sim::{SimConfig, TrafficSim, VehicleState, FIRST_ACTOR_ID};
