//! view.rs — Immutable published state of one coordinator cycle
//!
//! The coordinator builds a fresh `NetworkView` after every mutation and swaps
//! it in behind an `Arc`. Readers on other tasks hold their own `Arc` and never
//! see a half-applied cycle; at worst they are one cycle behind.

use std::collections::BTreeMap;

use bsm_types::{AgentId, BasicSafetyMessage, EnhancedMessage};

use crate::config::NetworkConfig;
use crate::stats::NetworkStatistics;
use crate::threat::{ThreatLevel, ThreatRecord};
use crate::topology::NetworkTopology;

#[derive(Debug, Clone, Default)]
pub struct NetworkView {
    pub(crate) config: NetworkConfig,
    /// Performed update cycles so far
    pub(crate) cycle: u64,
    /// Sim time of the last performed update
    pub(crate) timestamp: f64,
    /// Every registered agent and its running sequence counter
    pub(crate) sequences: BTreeMap<AgentId, u8>,
    pub(crate) bsms: BTreeMap<AgentId, BasicSafetyMessage>,
    pub(crate) topology: NetworkTopology,
    pub(crate) threats: BTreeMap<(AgentId, AgentId), ThreatRecord>,
    pub(crate) shared: BTreeMap<AgentId, EnhancedMessage>,
    pub(crate) stats: NetworkStatistics,
}

impl NetworkView {
    pub fn empty(config: NetworkConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn cycle(&self) -> u64 { self.cycle }
    pub fn timestamp(&self) -> f64 { self.timestamp }
    pub fn max_range(&self) -> f64 { self.config.max_range_m }
    pub fn update_rate(&self) -> f64 { self.config.update_rate_hz }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.sequences.keys().copied().collect()
    }

    pub fn is_registered(&self, agent_id: AgentId) -> bool {
        self.sequences.contains_key(&agent_id)
    }

    pub fn vehicle_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn get_bsm(&self, agent_id: AgentId) -> Option<BasicSafetyMessage> {
        self.bsms.get(&agent_id).cloned()
    }

    /// All live BSMs, ascending by agent id.
    pub fn get_all_bsm(&self) -> Vec<BasicSafetyMessage> {
        self.bsms.values().cloned().collect()
    }

    /// Neighbors' BSMs (never the subject's own), ascending by neighbor id.
    pub fn get_neighbors(&self, agent_id: AgentId) -> Vec<BasicSafetyMessage> {
        self.topology
            .neighbors_of(agent_id)
            .filter_map(|n| self.bsms.get(&n).cloned())
            .collect()
    }

    pub fn neighbor_count(&self, agent_id: AgentId) -> usize {
        self.topology.neighbor_count(agent_id)
    }

    /// Threats where `agent_id` is the subject, highest level first.
    pub fn get_threats(&self, agent_id: AgentId) -> Vec<ThreatRecord> {
        let mut threats: Vec<ThreatRecord> = self
            .threats
            .range((agent_id, AgentId::MIN)..=(agent_id, AgentId::MAX))
            .map(|(_, t)| *t)
            .collect();
        // Stable: equal levels stay in ascending other-id order
        threats.sort_by(|a, b| b.level.cmp(&a.level));
        threats
    }

    pub fn get_distance(&self, a: AgentId, b: AgentId) -> Option<f64> {
        self.topology.distance(a, b)
    }

    pub fn get_network_stats(&self) -> NetworkStatistics {
        self.stats
    }

    /// Latest enhanced message this agent shared, if any.
    pub fn get_shared_message(&self, agent_id: AgentId) -> Option<EnhancedMessage> {
        self.shared.get(&agent_id).cloned()
    }

    pub fn sequence_of(&self, agent_id: AgentId) -> Option<u8> {
        self.sequences.get(&agent_id).copied()
    }

    /// Compact console summary: speed, heading, neighbors, threats at level ≥ 3, message counter.
    pub fn one_line_status(&self, agent_id: AgentId) -> String {
        let Some(bsm) = self.bsms.get(&agent_id) else {
            return "V2V: No data".to_string();
        };
        let high_threats = self
            .get_threats(agent_id)
            .iter()
            .filter(|t| t.level >= ThreatLevel::High)
            .count();
        format!(
            "V2V: {:5.1}m/s | Heading:{:6.1}° | Neighbors:{:2} | Threats:{:2} | Msgs:{:3}",
            bsm.speed,
            bsm.heading,
            self.neighbor_count(agent_id),
            high_threats,
            self.sequence_of(agent_id).unwrap_or(0),
        )
    }
}
