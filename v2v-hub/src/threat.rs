//! threat.rs — Pairwise collision-risk classification
//!
//! Distance first, then time-to-collision bands. TTC is `+∞` when the two
//! vehicles are not closing, which always falls into the lowest non-zero band.

use bsm_types::{AgentId, BasicSafetyMessage};
use serde::{Deserialize, Serialize};

/// Beyond this separation a pair is never a threat (meters).
pub const THREAT_DISTANCE_M: f64 = 100.0;

/// Relative speeds at or below this are treated as "not closing" (m/s).
pub const MIN_RELATIVE_SPEED_MPS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ThreatLevel {
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl From<ThreatLevel> for u8 {
    fn from(level: ThreatLevel) -> u8 {
        level as u8
    }
}

impl TryFrom<u8> for ThreatLevel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            4 => Ok(Self::Critical),
            other => Err(format!("threat level out of range: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatAssessment {
    pub level: ThreatLevel,
    /// Seconds; `f64::INFINITY` when not closing
    pub time_to_collision: f64,
    pub distance: f64,
}

/// Stored result for one (subject, other) adjacency edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatRecord {
    pub subject_agent_id: AgentId,
    pub other_agent_id: AgentId,
    pub level: ThreatLevel,
    pub time_to_collision: f64,
    pub distance: f64,
    /// Sim time of the cycle that produced this record
    pub timestamp: f64,
}

impl ThreatRecord {
    pub fn new(subject: AgentId, other: AgentId, a: ThreatAssessment, timestamp: f64) -> Self {
        Self {
            subject_agent_id: subject,
            other_agent_id: other,
            level: a.level,
            time_to_collision: a.time_to_collision,
            distance: a.distance,
            timestamp,
        }
    }
}

/// Classify collision risk of `other` as seen from `subject`.
pub fn evaluate(subject: &BasicSafetyMessage, other: &BasicSafetyMessage) -> ThreatAssessment {
    let distance = subject.position.planar_distance(&other.position);

    let (svx, svy) = subject.planar_velocity();
    let (ovx, ovy) = other.planar_velocity();
    let relative_speed = (ovx - svx).hypot(ovy - svy);

    let time_to_collision = if relative_speed > MIN_RELATIVE_SPEED_MPS {
        distance / relative_speed
    } else {
        f64::INFINITY
    };

    ThreatAssessment {
        level: classify(distance, time_to_collision),
        time_to_collision,
        distance,
    }
}

/// First matching band wins.
pub fn classify(distance: f64, ttc: f64) -> ThreatLevel {
    if distance > THREAT_DISTANCE_M {
        ThreatLevel::None
    } else if ttc > 10.0 {
        ThreatLevel::Low
    } else if ttc > 5.0 {
        ThreatLevel::Medium
    } else if ttc > 2.0 {
        ThreatLevel::High
    } else {
        ThreatLevel::Critical
    }
}
