//! # Network Coordinator
//!
//! Single writer for everything V2V: the agent registry, neighbor topology,
//! threat table and statistics. One `update` call runs a full cycle:
//!
//! 1. Rate gate on snapshot time (`1 / update_rate_hz`)
//! 2. Refresh each registered agent's BSM from the motion snapshot
//! 3. Rebuild the topology over the full BSM set
//! 4. Evaluate every directed adjacency edge
//! 5. Fold the cycle into statistics and publish a new `NetworkView`
//!
//! Readers only ever get the published view.

use std::collections::BTreeMap;
use std::sync::Arc;

use bsm_types::{
    ActorId, AgentId, BasicSafetyMessage, BsmPartII, CooperativeStatus, EnhancedMessage,
    MessagePriority, MotionSnapshot, SensorPayload, VehicleType, SHARE_LIDAR_DISTANCE,
};
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::registry::AgentRegistry;
use crate::stats::NetworkStatistics;
use crate::threat::{self, ThreatLevel, ThreatRecord};
use crate::topology::NetworkTopology;
use crate::view::NetworkView;

/// Tolerance on the rate gate so accumulated tick times still hit the cadence.
const GATE_EPSILON_S: f64 = 1e-9;

pub struct NetworkCoordinator {
    config: NetworkConfig,
    registry: AgentRegistry,
    topology: NetworkTopology,
    threats: BTreeMap<(AgentId, AgentId), ThreatRecord>,
    shared: BTreeMap<AgentId, EnhancedMessage>,
    stats: NetworkStatistics,
    /// Snapshot time of the last performed update
    last_update: Option<f64>,
    view: Arc<NetworkView>,
}

impl NetworkCoordinator {
    pub fn new(config: NetworkConfig) -> Self {
        info!(
            "📡 V2V network initialized — range {:.0} m, {:.1} Hz, cooperative perception {}",
            config.max_range_m,
            config.update_rate_hz,
            if config.cooperative_perception { "on" } else { "off" },
        );
        Self {
            config,
            registry: AgentRegistry::new(),
            topology: NetworkTopology::default(),
            threats: BTreeMap::new(),
            shared: BTreeMap::new(),
            stats: NetworkStatistics::default(),
            last_update: None,
            view: Arc::new(NetworkView::empty(config)),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Current published state. Cheap; hand this to other tasks.
    pub fn view(&self) -> Arc<NetworkView> {
        Arc::clone(&self.view)
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Track `agent_id`, found in snapshots under `handle`. Re-registering resets it.
    pub fn register(&mut self, agent_id: AgentId, handle: ActorId) {
        if self.registry.contains(agent_id) {
            self.forget(agent_id);
        }
        self.registry.register(agent_id, handle);
        debug!(agent_id, handle, "Registered vehicle");
        self.publish();
    }

    /// Stop tracking `agent_id` and drop everything derived from it. No-op if absent.
    pub fn unregister(&mut self, agent_id: AgentId) {
        if !self.registry.unregister(agent_id) {
            return;
        }
        self.forget(agent_id);
        debug!(agent_id, "Unregistered vehicle");
        self.publish();
    }

    fn forget(&mut self, agent_id: AgentId) {
        self.topology = self.topology.without(agent_id);
        self.threats.retain(|(s, o), _| *s != agent_id && *o != agent_id);
        self.shared.remove(&agent_id);
    }

    // ── Update cycle ──────────────────────────────────────────────────────────

    /// Run one cycle unless the rate gate says it is too early. Returns whether it ran.
    pub fn update(&mut self, snapshot: &MotionSnapshot, force: bool) -> bool {
        let now = snapshot.timestamp;

        if let Some(last) = self.last_update {
            let elapsed = now - last;
            if elapsed < 0.0 {
                debug!(last, now, "Snapshot time went backwards, treating as clock reset");
            } else if !force && elapsed + GATE_EPSILON_S < self.config.update_interval_s() {
                return false;
            }
        }

        let mut refreshed = 0usize;
        for (agent_id, handle) in self.registry.handles() {
            let Some(sample) = snapshot.find(handle) else {
                warn!(agent_id, handle, "Vehicle missing from motion snapshot, keeping previous BSM");
                continue;
            };
            // Derivatives span the time since this agent's own previous BSM
            let delta_time = self
                .registry
                .bsm(agent_id)
                .map(|prev| now - prev.timestamp)
                .filter(|dt| *dt > 0.0)
                .unwrap_or(0.0);
            if self.registry.refresh_one(agent_id, sample, delta_time, now).is_some() {
                refreshed += 1;
            }
        }

        self.topology = NetworkTopology::rebuild(self.registry.bsms(), self.config.max_range_m);
        self.threats = self.assess_threats(now);

        let counts = self.registry.ids().into_iter().map(|id| self.topology.neighbor_count(id));
        self.stats.record_cycle(refreshed, counts);
        self.last_update = Some(now);
        self.publish();

        debug!(
            "V2V update completed: {} vehicles, avg {:.1} neighbors",
            self.registry.len(),
            self.stats.average_neighbors,
        );
        true
    }

    fn assess_threats(&self, now: f64) -> BTreeMap<(AgentId, AgentId), ThreatRecord> {
        self.topology
            .edges()
            .filter_map(|(subject, other)| {
                let a = self.registry.bsm(subject)?;
                let b = self.registry.bsm(other)?;
                let record = ThreatRecord::new(subject, other, threat::evaluate(a, b), now);
                Some(((subject, other), record))
            })
            .collect()
    }

    fn publish(&mut self) {
        self.view = Arc::new(NetworkView {
            config: self.config,
            cycle: self.stats.update_cycles,
            timestamp: self.last_update.unwrap_or(0.0),
            sequences: self.registry.sequences(),
            bsms: self.registry.bsms().map(|b| (b.agent_id, b.clone())).collect(),
            topology: self.topology.clone(),
            threats: self.threats.clone(),
            shared: self.shared.clone(),
            stats: self.stats,
        });
    }

    // ── Cooperative perception ────────────────────────────────────────────────

    /// Share a sensor payload with close-range neighbors. Returns recipients, ascending.
    ///
    /// LiDAR summaries only reach recipients within `SHARE_LIDAR_DISTANCE`.
    pub fn enable_cooperative_sharing(&mut self, agent_id: AgentId, payload: SensorPayload) -> Vec<AgentId> {
        if !self.config.cooperative_perception {
            return Vec::new();
        }
        let Some(bsm) = self.registry.bsm(agent_id).cloned() else {
            return Vec::new();
        };

        let within = |limit: f64| {
            self.topology
                .neighbors_of(agent_id)
                .filter(|n| self.topology.distance(agent_id, *n).is_some_and(|d| d <= limit))
                .collect::<Vec<_>>()
        };
        let recipients = within(self.config.share_distance_m);
        if recipients.is_empty() {
            return recipients;
        }
        let lidar_recipients = if payload.lidar_summary.is_some() {
            within(self.config.share_distance_m.min(SHARE_LIDAR_DISTANCE))
        } else {
            Vec::new()
        };

        let priority = self.share_priority(&bsm);
        let message = EnhancedMessage {
            part_ii: Some(BsmPartII::for_vehicle(bsm.vehicle_type, CooperativeStatus::Available)),
            bsm,
            payload,
            transmission_time: self.last_update.unwrap_or(0.0),
            link_quality: 100.0,
            hop_count: 0,
            priority,
            recipients: recipients.clone(),
            lidar_recipients,
        };

        self.stats.record_shares(recipients.len());
        self.shared.insert(agent_id, message);
        self.publish();

        debug!(agent_id, recipients = recipients.len(), ?priority, "Shared sensor data");
        recipients
    }

    fn share_priority(&self, bsm: &BasicSafetyMessage) -> MessagePriority {
        let worst = self
            .threats
            .range((bsm.agent_id, AgentId::MIN)..=(bsm.agent_id, AgentId::MAX))
            .map(|(_, t)| t.level)
            .max();
        if bsm.vehicle_type == VehicleType::Emergency || worst == Some(ThreatLevel::Critical) {
            MessagePriority::Emergency
        } else if worst == Some(ThreatLevel::High) {
            MessagePriority::High
        } else {
            MessagePriority::Routine
        }
    }

    // ── Read API (delegates to the published view) ────────────────────────────

    pub fn get_bsm(&self, agent_id: AgentId) -> Option<BasicSafetyMessage> {
        self.view.get_bsm(agent_id)
    }

    pub fn get_all_bsm(&self) -> Vec<BasicSafetyMessage> {
        self.view.get_all_bsm()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.view.agent_ids()
    }

    pub fn get_neighbors(&self, agent_id: AgentId) -> Vec<BasicSafetyMessage> {
        self.view.get_neighbors(agent_id)
    }

    pub fn get_threats(&self, agent_id: AgentId) -> Vec<ThreatRecord> {
        self.view.get_threats(agent_id)
    }

    pub fn get_distance(&self, a: AgentId, b: AgentId) -> Option<f64> {
        self.view.get_distance(a, b)
    }

    pub fn get_network_stats(&self) -> NetworkStatistics {
        self.view.get_network_stats()
    }

    pub fn get_one_line_status(&self, agent_id: AgentId) -> String {
        self.view.one_line_status(agent_id)
    }

    pub fn get_shared_message(&self, agent_id: AgentId) -> Option<EnhancedMessage> {
        self.view.get_shared_message(agent_id)
    }
}
