//! # bsm-types
//!
//! Shared V2V message structures for the cooperative-awareness hub.
//!
//! These types are used by:
//! - `v2v-hub`: building one Basic Safety Message (BSM) per tracked agent every update cycle
//! - `traffic-sim`: producing the per-tick `MotionSnapshot` the hub consumes
//!
//! ## Coordinate Conventions
//!
//! - **World frame**: local planar Cartesian, X/Y in meters, Z = elevation (carried, never used in range math)
//! - **Heading**: yaw in degrees measured from +X toward +Y, normalized to [0, 360) in the BSM
//!
//! ## Message layout
//! Field set follows SAE J2735 BSM Part I, with Part II carried only in the enhanced
//! (cooperative-sharing) message.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stable identity of an agent inside the hub registry.
pub type AgentId = u32;

/// Identity of the same vehicle inside the motion source.
pub type ActorId = u32;

// ── Protocol constants ────────────────────────────────────────────────────────

/// BSM `msgCount` wraps at 128 (7-bit field).
pub const SEQUENCE_MODULUS: u8 = 128;

/// Communication ranges (meters)
pub const V2V_RANGE_SHORT: f64 = 50.0;
pub const V2V_RANGE_MEDIUM: f64 = 150.0;
pub const V2V_RANGE_LONG: f64 = 300.0;

/// Transmission rates (Hz)
pub const BSM_RATE_NORMAL: f64 = 2.0;
pub const BSM_RATE_HIGH: f64 = 10.0;

/// Cooperative-sharing thresholds (meters)
pub const SHARE_SENSOR_DATA_DISTANCE: f64 = 50.0;
pub const SHARE_LIDAR_DISTANCE: f64 = 30.0;
pub const EMERGENCY_BROADCAST_DISTANCE: f64 = 300.0;

/// Full-lock steering angle used to scale the normalized steer input.
pub const MAX_STEERING_ANGLE_DEG: f64 = 70.0;

/// Position accuracy reported for simulated fixes (meters).
pub const SIM_POSITION_ACCURACY_M: f64 = 0.5;

// ── 3D Vector ─────────────────────────────────────────────────────────────────

/// 3D vector in the local world frame (meters or m/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self { Self { x, y, z } }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance in the X/Y plane; elevation is ignored.
    pub fn planar_distance(&self, other: &Vec3) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Vehicle classification carried in the BSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    #[default]
    PassengerCar,
    Bus,
    Truck,
    Motorcycle,
    Emergency,
    Unknown,
}

/// Braking system status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrakeStatus {
    #[default]
    Unavailable,
    Off,
    On,
    Engaged,
}

impl BrakeStatus {
    /// Classify a normalized brake input (0.0–1.0).
    pub fn from_brake_input(brake: f64) -> Self {
        if brake > 0.5 {
            Self::Engaged
        } else if brake > 0.1 {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionState {
    Park,
    Reverse,
    #[default]
    Neutral,
    Forward,
}

impl TransmissionState {
    pub fn from_controls(controls: &ControlInputs) -> Self {
        if controls.reverse {
            Self::Reverse
        } else if controls.throttle > 0.0 {
            Self::Forward
        } else {
            Self::Neutral
        }
    }
}

// ── Motion source contract ────────────────────────────────────────────────────

/// Driver inputs as reported by the motion source (normalized).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInputs {
    /// -1.0 (full left) … 1.0 (full right)
    pub steer: f64,
    /// 0.0 … 1.0
    pub throttle: f64,
    /// 0.0 … 1.0
    pub brake: f64,
    pub reverse: bool,
}

/// One agent's kinematic state for one external tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicSample {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Raw yaw in degrees, any range
    pub heading_deg: f64,
    pub controls: ControlInputs,
    /// Bounding-box half extents (meters)
    pub half_extents: Vec3,
    #[serde(default)]
    pub vehicle_type: VehicleType,
}

/// Everything the motion source knows about the world for one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotionSnapshot {
    /// Simulation time in seconds (monotonic within a run)
    pub timestamp: f64,
    pub samples: HashMap<ActorId, KinematicSample>,
}

impl MotionSnapshot {
    pub fn new(timestamp: f64) -> Self {
        Self { timestamp, samples: HashMap::new() }
    }

    pub fn insert(&mut self, actor_id: ActorId, sample: KinematicSample) {
        self.samples.insert(actor_id, sample);
    }

    /// Sample for one actor; `None` means "temporarily unavailable".
    pub fn find(&self, actor_id: ActorId) -> Option<&KinematicSample> {
        self.samples.get(&actor_id)
    }

    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }
}

/// What the previous BSM left behind for the next derivative computation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionHistory {
    pub speed: f64,
    /// `None` until the agent has produced its first BSM
    pub heading_deg: Option<f64>,
}

// ── Basic Safety Message (Part I) ─────────────────────────────────────────────

/// Basic Safety Message, replaced wholesale every update cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicSafetyMessage {
    pub agent_id: AgentId,
    /// Simulation time (seconds)
    pub timestamp: f64,
    /// 0..128, wraps
    pub sequence_counter: u8,
    pub vehicle_type: VehicleType,
    pub position: Vec3,
    pub position_accuracy: f64,
    /// m/s, magnitude of the velocity vector
    pub speed: f64,
    /// degrees, [0, 360)
    pub heading: f64,
    /// degrees
    pub steering_angle: f64,
    pub accel_longitudinal: f64,
    pub accel_lateral: f64,
    pub accel_vertical: f64,
    /// deg/s
    pub yaw_rate: f64,
    pub vehicle_length: f64,
    pub vehicle_width: f64,
    pub vehicle_height: f64,
    pub brake_status: BrakeStatus,
    /// 0–100
    pub brake_pressure: f64,
    pub transmission_state: TransmissionState,
    pub throttle_confidence: f64,
    pub brake_confidence: f64,
    pub steering_confidence: f64,
}

impl BasicSafetyMessage {
    /// Build the next BSM for an agent from a raw kinematic sample.
    ///
    /// `sequence_counter` is the agent's counter before this message; the returned
    /// message carries the incremented (wrapped) value.
    pub fn build(
        agent_id: AgentId,
        sample: &KinematicSample,
        history: MotionHistory,
        delta_time: f64,
        sequence_counter: u8,
        timestamp: f64,
    ) -> Self {
        let speed = sample.velocity.magnitude();
        let heading = normalize_heading(sample.heading_deg);

        let accel_longitudinal = if delta_time > 0.0 {
            (speed - history.speed) / delta_time
        } else {
            0.0
        };

        let yaw_rate = match history.heading_deg {
            Some(prev) if delta_time > 0.0 => heading_delta(prev, heading) / delta_time,
            _ => 0.0,
        };
        let accel_lateral = speed * yaw_rate.to_radians();

        Self {
            agent_id,
            timestamp,
            sequence_counter: next_sequence(sequence_counter),
            vehicle_type: sample.vehicle_type,
            position: sample.position,
            position_accuracy: SIM_POSITION_ACCURACY_M,
            speed,
            heading,
            steering_angle: sample.controls.steer * MAX_STEERING_ANGLE_DEG,
            accel_longitudinal,
            accel_lateral,
            accel_vertical: 0.0,
            yaw_rate,
            vehicle_length: sample.half_extents.x * 2.0,
            vehicle_width: sample.half_extents.y * 2.0,
            vehicle_height: sample.half_extents.z * 2.0,
            brake_status: BrakeStatus::from_brake_input(sample.controls.brake),
            brake_pressure: sample.controls.brake * 100.0,
            transmission_state: TransmissionState::from_controls(&sample.controls),
            throttle_confidence: 100.0,
            brake_confidence: 100.0,
            steering_confidence: 100.0,
        }
    }

    /// Velocity components in the X/Y plane reconstructed from (speed, heading).
    pub fn planar_velocity(&self) -> (f64, f64) {
        let rad = self.heading.to_radians();
        (self.speed * rad.cos(), self.speed * rad.sin())
    }

    pub fn history(&self) -> MotionHistory {
        MotionHistory { speed: self.speed, heading_deg: Some(self.heading) }
    }
}

/// Advance a BSM sequence counter, wrapping at 128.
pub fn next_sequence(counter: u8) -> u8 {
    ((counter as u16 + 1) % SEQUENCE_MODULUS as u16) as u8
}

/// Normalize any yaw into [0, 360).
pub fn normalize_heading(deg: f64) -> f64 {
    let h = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if h >= 360.0 { 0.0 } else { h }
}

/// Signed shortest rotation from `from` to `to`, in [-180, 180).
fn heading_delta(from: f64, to: f64) -> f64 {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

// ── BSM Part II (optional extended data) ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExteriorLights {
    #[default]
    Off,
    LowBeam,
    HighBeam,
    Fog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WiperStatus {
    #[default]
    Off,
    Intermittent,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooperativeStatus {
    #[default]
    Available,
    Busy,
    Unavailable,
}

/// Transmitted on demand alongside shared sensor data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BsmPartII {
    pub is_emergency_vehicle: bool,
    pub siren_active: bool,
    pub lights_active: bool,
    pub exterior_lights: ExteriorLights,
    pub wiper_status: WiperStatus,
    pub cooperative_status: CooperativeStatus,
}

impl BsmPartII {
    pub fn for_vehicle(vehicle_type: VehicleType, cooperative_status: CooperativeStatus) -> Self {
        let emergency = vehicle_type == VehicleType::Emergency;
        Self {
            is_emergency_vehicle: emergency,
            siren_active: emergency,
            lights_active: emergency,
            exterior_lights: ExteriorLights::LowBeam,
            wiper_status: WiperStatus::Off,
            cooperative_status,
        }
    }
}

// ── Cooperative perception payload ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePriority {
    #[default]
    Routine,
    High,
    Emergency,
}

/// One object seen by the sharing vehicle's sensors (world frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub object_id: u32,
    pub kind: String,
    pub position: Vec3,
    /// 0.0 … 1.0
    pub confidence: f64,
}

/// Downsampled LiDAR summary; the raw cloud never travels over V2V.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LidarSummary {
    pub point_count: u32,
    pub max_range_m: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    #[serde(default)]
    pub detected_objects: Vec<DetectedObject>,
    #[serde(default)]
    pub camera_detections: Vec<DetectedObject>,
    #[serde(default)]
    pub lidar_summary: Option<LidarSummary>,
}

/// BSM combined with shared sensor data for cooperative perception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedMessage {
    pub bsm: BasicSafetyMessage,
    pub part_ii: Option<BsmPartII>,
    pub payload: SensorPayload,
    pub transmission_time: f64,
    /// 0–100
    pub link_quality: f64,
    pub hop_count: u8,
    pub priority: MessagePriority,
    /// Agents that received the payload (ascending)
    pub recipients: Vec<AgentId>,
    /// Subset of `recipients` close enough to also receive the LiDAR summary
    pub lidar_recipients: Vec<AgentId>,
}
