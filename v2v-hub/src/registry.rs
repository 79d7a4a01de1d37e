//! registry.rs — Tracked agents and their most recent BSM

use std::collections::BTreeMap;

use bsm_types::{ActorId, AgentId, BasicSafetyMessage, KinematicSample, MotionHistory};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentEntry {
    /// Where to find this agent in the motion snapshot
    pub handle: ActorId,
    /// Counter carried by the latest BSM (0 before the first one)
    pub sequence: u8,
    pub history: MotionHistory,
    pub bsm: Option<BasicSafetyMessage>,
}

impl AgentEntry {
    fn new(handle: ActorId) -> Self {
        Self { handle, sequence: 0, history: MotionHistory::default(), bsm: None }
    }
}

/// Ordered by agent id so every derived list comes out in a stable order.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, AgentEntry>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-registering an id starts it over: counter 0, no BSM.
    pub fn register(&mut self, agent_id: AgentId, handle: ActorId) {
        self.agents.insert(agent_id, AgentEntry::new(handle));
    }

    /// Returns whether the agent was present.
    pub fn unregister(&mut self, agent_id: AgentId) -> bool {
        self.agents.remove(&agent_id).is_some()
    }

    /// Build and store the next BSM for `agent_id`, replacing the previous one.
    ///
    /// Returns `None` only when the agent is not registered.
    pub fn refresh_one(
        &mut self,
        agent_id: AgentId,
        sample: &KinematicSample,
        delta_time: f64,
        timestamp: f64,
    ) -> Option<&BasicSafetyMessage> {
        let entry = self.agents.get_mut(&agent_id)?;
        let bsm = BasicSafetyMessage::build(agent_id, sample, entry.history, delta_time, entry.sequence, timestamp);
        entry.sequence = bsm.sequence_counter;
        entry.history = bsm.history();
        Some(&*entry.bsm.insert(bsm))
    }

    pub fn get(&self, agent_id: AgentId) -> Option<&AgentEntry> {
        self.agents.get(&agent_id)
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.agents.contains_key(&agent_id)
    }

    pub fn bsm(&self, agent_id: AgentId) -> Option<&BasicSafetyMessage> {
        self.agents.get(&agent_id).and_then(|e| e.bsm.as_ref())
    }

    /// Agents and their motion handles, ascending by id.
    pub fn handles(&self) -> Vec<(AgentId, ActorId)> {
        self.agents.iter().map(|(id, e)| (*id, e.handle)).collect()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Every live BSM, ascending by agent id.
    pub fn bsms(&self) -> impl Iterator<Item = &BasicSafetyMessage> {
        self.agents.values().filter_map(|e| e.bsm.as_ref())
    }

    pub fn sequences(&self) -> BTreeMap<AgentId, u8> {
        self.agents.iter().map(|(id, e)| (*id, e.sequence)).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsm_types::Vec3;

    fn moving(vx: f64) -> KinematicSample {
        KinematicSample {
            velocity: Vec3::new(vx, 0.0, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_starts_without_bsm() {
        let mut reg = AgentRegistry::new();
        reg.register(1, 100);
        assert!(reg.contains(1));
        assert!(reg.bsm(1).is_none());
        assert_eq!(reg.get(1).map(|e| e.sequence), Some(0));
    }

    #[test]
    fn test_refresh_tracks_sequence_and_previous_speed() {
        let mut reg = AgentRegistry::new();
        reg.register(1, 100);

        let first = reg.refresh_one(1, &moving(10.0), 0.0, 0.0).cloned().unwrap();
        assert_eq!(first.sequence_counter, 1);
        assert_eq!(first.accel_longitudinal, 0.0);

        let second = reg.refresh_one(1, &moving(12.0), 0.5, 0.5).cloned().unwrap();
        assert_eq!(second.sequence_counter, 2);
        assert!((second.accel_longitudinal - 4.0).abs() < 1e-9);
        assert_eq!(reg.get(1).map(|e| e.history.speed), Some(12.0));
    }

    #[test]
    fn test_reregister_resets_agent() {
        let mut reg = AgentRegistry::new();
        reg.register(1, 100);
        reg.refresh_one(1, &moving(5.0), 0.0, 0.0);
        reg.register(1, 200);
        let e = reg.get(1).unwrap();
        assert_eq!(e.handle, 200);
        assert_eq!(e.sequence, 0);
        assert!(e.bsm.is_none());
    }

    #[test]
    fn test_unregister_unknown_is_harmless() {
        let mut reg = AgentRegistry::new();
        assert!(!reg.unregister(42));
        reg.register(42, 1);
        assert!(reg.unregister(42));
        assert!(reg.is_empty());
        assert!(reg.refresh_one(42, &moving(1.0), 0.0, 0.0).is_none());
    }

    #[test]
    fn test_ordered_iteration() {
        let mut reg = AgentRegistry::new();
        for id in [5, 1, 3] {
            reg.register(id, id + 100);
            reg.refresh_one(id, &moving(1.0), 0.0, 0.0);
        }
        assert_eq!(reg.ids(), vec![1, 3, 5]);
        let ids: Vec<_> = reg.bsms().map(|b| b.agent_id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(reg.handles()[0], (1, 101));
    }
}
