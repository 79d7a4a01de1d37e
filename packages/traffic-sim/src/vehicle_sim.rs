//! vehicle_sim.rs — Road vehicle kinematics
//!
//! Simulates N vehicles driving straight lanes inside a square world.
//! Each vehicle has:
//! - Position in the local world frame (meters), wrapped at the world edge
//! - Speed with first-order lag toward a target speed
//! - Car following: brakes when a leader in the same lane is inside the safe gap
//! - Steering noise around lane-keeping (reported, heading stays on the lane)
//!
//! Output is one `MotionSnapshot` per tick, the same contract a real
//! simulator bridge would fill.

use bsm_types::{ActorId, ControlInputs, KinematicSample, MotionSnapshot, Vec3, VehicleType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scenarios::{ScenarioConfig, ScenarioType};

/// Actor ids are allocated from here upward.
pub const FIRST_ACTOR_ID: ActorId = 100;

/// Car-sized half extents (4.5 × 1.8 × 1.5 m box)
const CAR_HALF_EXTENTS: Vec3 = Vec3 { x: 2.25, y: 0.9, z: 0.75 };
const TRUCK_HALF_EXTENTS: Vec3 = Vec3 { x: 4.0, y: 1.25, z: 1.6 };

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Side length of the square world (meters)
    pub world_size_m: f64,
    pub target_speed_mps: f64,
    /// Spread of per-vehicle base speeds (m/s, ~2σ)
    pub speed_variance: f64,
    pub lane_width_m: f64,
    /// Minimum bumper gap before braking (meters)
    pub safety_gap_m: f64,
    /// Extra gap per m/s of own speed (seconds)
    pub time_headway_s: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world_size_m: 400.0,
            target_speed_mps: 13.9,
            speed_variance: 4.0,
            lane_width_m: 3.5,
            safety_gap_m: 8.0,
            time_headway_s: 1.0,
            seed: 42,
        }
    }
}

// ── Vehicle state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct VehicleState {
    pub actor_id: ActorId,
    /// Vehicles only follow leaders that share this lane key
    pub lane: u32,
    pub position: Vec3,
    /// Yaw, degrees from +X toward +Y
    pub heading_deg: f64,
    pub speed_mps: f64,
    pub base_speed_mps: f64,
    pub controls: ControlInputs,
    pub vehicle_type: VehicleType,
    pub half_extents: Vec3,
}

impl VehicleState {
    fn direction(&self) -> (f64, f64) {
        let rad = self.heading_deg.to_radians();
        (rad.cos(), rad.sin())
    }

    pub fn velocity(&self) -> Vec3 {
        let (dx, dy) = self.direction();
        Vec3::new(self.speed_mps * dx, self.speed_mps * dy, 0.0)
    }

    pub fn sample(&self) -> KinematicSample {
        KinematicSample {
            position: self.position,
            velocity: self.velocity(),
            heading_deg: self.heading_deg,
            controls: self.controls,
            half_extents: self.half_extents,
            vehicle_type: self.vehicle_type,
        }
    }
}

// ── Simulation tick ───────────────────────────────────────────────────────────

pub struct TrafficSim {
    pub vehicles: Vec<VehicleState>,
    pub scenario: ScenarioConfig,
    pub t_elapsed: f64,
    pub tick_count: u64,

    world_half: f64,
    safety_gap: f64,
    time_headway: f64,
    rng: StdRng,
}

impl TrafficSim {
    pub fn new(cfg: &SimConfig, scenario: ScenarioConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let vehicles = Self::spawn_vehicles(cfg, &scenario, &mut rng);
        debug!("Spawned {} vehicles for {} scenario", vehicles.len(), scenario.layout);
        Self {
            vehicles,
            scenario,
            t_elapsed: 0.0,
            tick_count: 0,
            world_half: cfg.world_size_m / 2.0,
            safety_gap: cfg.safety_gap_m,
            time_headway: cfg.time_headway_s,
            rng,
        }
    }

    fn spawn_vehicles(cfg: &SimConfig, scenario: &ScenarioConfig, rng: &mut StdRng) -> Vec<VehicleState> {
        let n = scenario.n_vehicles;
        let half = cfg.world_size_m / 2.0;
        let lane_w = cfg.lane_width_m;
        let speed_dist = Normal::new(cfg.target_speed_mps, cfg.speed_variance.max(0.0) / 2.0).ok();

        let draw_speed = |rng: &mut StdRng| -> f64 {
            let v = match &speed_dist {
                Some(d) => d.sample(rng),
                None => cfg.target_speed_mps,
            };
            v.max(1.0)
        };

        (0..n).map(|i| {
            let actor_id = FIRST_ACTOR_ID + i as ActorId;
            let base_speed = draw_speed(rng);
            let jitter = rng.gen_range(-3.0..3.0);

            let (lane, position, heading_deg, base_speed, vehicle_type) = match scenario.layout {
                ScenarioType::Highway => {
                    let lane = (i % 3) as u32;
                    let slot = (i / 3) as f64;
                    let per_lane = ((n + 2) / 3).max(1) as f64;
                    let x = -half * 0.9 + slot * (1.8 * half / per_lane) + jitter;
                    let y = (lane as f64 - 1.0) * lane_w;
                    let vt = if i % 7 == 6 { VehicleType::Truck } else { VehicleType::PassengerCar };
                    (lane, Vec3::new(x, y, 0.0), 0.0, base_speed, vt)
                }
                ScenarioType::Intersection => {
                    let stream = (i % 2) as u32;
                    let slot = (i / 2) as f64;
                    let d = 40.0 + slot * 30.0 + jitter;
                    if stream == 0 {
                        (0, Vec3::new(-d, 0.0, 0.0), 0.0, base_speed, VehicleType::PassengerCar)
                    } else {
                        (1, Vec3::new(0.0, -d, 0.0), 90.0, base_speed, VehicleType::PassengerCar)
                    }
                }
                ScenarioType::Convoy => {
                    let x = -(i as f64) * 15.0;
                    if i + 1 == n && n > 1 {
                        // Tail vehicle: emergency responder closing on the platoon
                        (0, Vec3::new(x - 40.0, 0.0, 0.0), 0.0, cfg.target_speed_mps * 1.6, VehicleType::Emergency)
                    } else {
                        (0, Vec3::new(x, 0.0, 0.0), 0.0, cfg.target_speed_mps, VehicleType::PassengerCar)
                    }
                }
                ScenarioType::HeadOn => {
                    let lane = (i % 2) as u32;
                    let slot = (i / 2) as f64;
                    if lane == 0 {
                        (0, Vec3::new(-half * 0.8 + slot * 25.0 + jitter, -lane_w / 2.0, 0.0), 0.0, base_speed, VehicleType::PassengerCar)
                    } else {
                        (1, Vec3::new(half * 0.8 - slot * 25.0 + jitter, lane_w / 2.0, 0.0), 180.0, base_speed, VehicleType::PassengerCar)
                    }
                }
            };

            let half_extents = if vehicle_type == VehicleType::Truck { TRUCK_HALF_EXTENTS } else { CAR_HALF_EXTENTS };

            VehicleState {
                actor_id,
                lane,
                position,
                heading_deg,
                speed_mps: base_speed,
                base_speed_mps: base_speed,
                controls: ControlInputs { throttle: 0.3, ..Default::default() },
                vehicle_type,
                half_extents,
            }
        }).collect()
    }

    /// Gap to the nearest leader in the same lane and that leader's speed.
    fn leader_of(&self, idx: usize) -> Option<(f64, f64)> {
        let me = &self.vehicles[idx];
        let (dx, dy) = me.direction();
        self.vehicles.iter().enumerate()
            .filter(|(j, other)| *j != idx && other.lane == me.lane)
            .filter_map(|(_, other)| {
                let along = (other.position.x - me.position.x) * dx + (other.position.y - me.position.y) * dy;
                let bumper_gap = along - me.half_extents.x - other.half_extents.x;
                (along > 0.0).then_some((bumper_gap, other.speed_mps))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Advance simulation by dt seconds
    pub fn tick(&mut self, dt: f64) {
        self.t_elapsed += dt;
        self.tick_count += 1;

        let leaders: Vec<Option<(f64, f64)>> = (0..self.vehicles.len())
            .map(|i| self.leader_of(i))
            .collect();

        let lag = (dt * 2.0).min(1.0);
        let size = self.world_half * 2.0;

        for (vehicle, leader) in self.vehicles.iter_mut().zip(leaders) {
            let safe_gap = self.safety_gap + vehicle.speed_mps * self.time_headway;

            // Car following: match the leader and back off proportionally to the gap deficit
            let target = match leader {
                Some((gap, leader_speed)) if gap < safe_gap => {
                    let ratio = (gap / safe_gap).clamp(0.0, 1.0);
                    leader_speed.min(vehicle.base_speed_mps) * ratio
                }
                _ => vehicle.base_speed_mps,
            };

            let error = target - vehicle.speed_mps;
            vehicle.controls = if error < -0.2 {
                ControlInputs { brake: (-error / 5.0).clamp(0.0, 1.0), ..Default::default() }
            } else {
                ControlInputs { throttle: (error / 5.0 + 0.3).clamp(0.0, 1.0), ..Default::default() }
            };
            vehicle.controls.steer = self.rng.gen_range(-0.02..0.02);

            vehicle.speed_mps = (vehicle.speed_mps + error * lag).max(0.0);

            let v = vehicle.velocity();
            vehicle.position.x += v.x * dt;
            vehicle.position.y += v.y * dt;

            // Wrap at the world edge
            if vehicle.position.x > self.world_half { vehicle.position.x -= size; }
            if vehicle.position.x < -self.world_half { vehicle.position.x += size; }
            if vehicle.position.y > self.world_half { vehicle.position.y -= size; }
            if vehicle.position.y < -self.world_half { vehicle.position.y += size; }
        }
    }

    /// Snapshot of every actor that is currently reporting.
    pub fn snapshot(&self) -> MotionSnapshot {
        let mut snap = MotionSnapshot::new(self.t_elapsed);
        for v in &self.vehicles {
            if self.scenario.is_actor_dropped(v.actor_id, self.tick_count) {
                continue;
            }
            snap.insert(v.actor_id, v.sample());
        }
        snap
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.vehicles.iter().map(|v| v.actor_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::preset_dropout;

    #[test]
    fn test_spawn_is_deterministic_for_seed() {
        let cfg = SimConfig::default();
        let a = TrafficSim::new(&cfg, ScenarioConfig::default());
        let b = TrafficSim::new(&cfg, ScenarioConfig::default());
        let pa: Vec<_> = a.vehicles.iter().map(|v| (v.position, v.base_speed_mps)).collect();
        let pb: Vec<_> = b.vehicles.iter().map(|v| (v.position, v.base_speed_mps)).collect();
        assert_eq!(pa, pb);
        assert_eq!(a.actor_ids()[0], FIRST_ACTOR_ID);
    }

    #[test]
    fn test_vehicles_move_along_heading() {
        let cfg = SimConfig::default();
        let mut sim = TrafficSim::new(&cfg, ScenarioConfig::new(ScenarioType::Intersection, 2));
        let before: Vec<Vec3> = sim.vehicles.iter().map(|v| v.position).collect();
        sim.tick(0.5);
        // East-bound stream moves in +x, north-bound in +y
        assert!(sim.vehicles[0].position.x > before[0].x);
        assert!((sim.vehicles[0].position.y - before[0].y).abs() < 1e-9);
        assert!(sim.vehicles[1].position.y > before[1].y);
        assert!((sim.t_elapsed - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_follower_brakes_behind_slow_leader() {
        let cfg = SimConfig::default();
        let mut sim = TrafficSim::new(&cfg, ScenarioConfig::new(ScenarioType::Convoy, 2));
        // Put the follower right behind a stopped leader
        sim.vehicles[0].position = Vec3::new(10.0, 0.0, 0.0);
        sim.vehicles[0].speed_mps = 0.0;
        sim.vehicles[0].base_speed_mps = 0.0;
        sim.vehicles[1].position = Vec3::new(0.0, 0.0, 0.0);
        sim.vehicles[1].speed_mps = 15.0;
        sim.tick(0.05);
        assert!(sim.vehicles[1].controls.brake > 0.5);
        assert!(sim.vehicles[1].speed_mps < 15.0);
    }

    #[test]
    fn test_positions_wrap_inside_world() {
        let cfg = SimConfig::default();
        let mut sim = TrafficSim::new(&cfg, ScenarioConfig::new(ScenarioType::Highway, 3));
        for _ in 0..400 {
            sim.tick(0.5);
        }
        for v in &sim.vehicles {
            assert!(v.position.x.abs() <= 200.0 + 1e-6);
            assert!(v.position.y.abs() <= 200.0 + 1e-6);
        }
    }

    #[test]
    fn test_snapshot_skips_dropped_actors() {
        let cfg = SimConfig::default();
        let sim = TrafficSim::new(&cfg, preset_dropout(4));
        let snap = sim.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.find(FIRST_ACTOR_ID).is_none());
        assert!(snap.find(FIRST_ACTOR_ID + 1).is_some());
    }

    #[test]
    fn test_convoy_tail_is_emergency_vehicle() {
        let sim = TrafficSim::new(&SimConfig::default(), ScenarioConfig::new(ScenarioType::Convoy, 4));
        assert_eq!(sim.vehicles[3].vehicle_type, VehicleType::Emergency);
        assert_eq!(sim.vehicles[0].vehicle_type, VehicleType::PassengerCar);
    }
}
