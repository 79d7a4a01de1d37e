//! Neighbor discovery.
//!
//! The adjacency is rebuilt from scratch every cycle from the current BSM set.
//! Each unordered pair is measured once and cached under a canonical key, so
//! `b ∈ neighbors(a) ⇔ a ∈ neighbors(b)` holds by construction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bsm_types::{AgentId, BasicSafetyMessage};

/// Unordered agent pair, stored as (min, max).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(AgentId, AgentId);

impl PairKey {
    pub fn new(a: AgentId, b: AgentId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.0 == id || self.1 == id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkTopology {
    /// Every agent with a BSM has an entry, possibly empty
    neighbors: BTreeMap<AgentId, BTreeSet<AgentId>>,
    distances: HashMap<PairKey, f64>,
}

impl NetworkTopology {
    /// O(n²) all-pairs scan over agents that currently have a BSM.
    pub fn rebuild<'a>(bsms: impl IntoIterator<Item = &'a BasicSafetyMessage>, max_range: f64) -> Self {
        let bsms: Vec<&BasicSafetyMessage> = bsms.into_iter().collect();
        let mut topo = Self::default();

        for bsm in &bsms {
            topo.neighbors.entry(bsm.agent_id).or_default();
        }

        for (i, a) in bsms.iter().enumerate() {
            for b in &bsms[i + 1..] {
                if a.agent_id == b.agent_id {
                    continue;
                }
                let distance = a.position.planar_distance(&b.position);
                topo.distances.insert(PairKey::new(a.agent_id, b.agent_id), distance);

                if distance <= max_range {
                    topo.link(a.agent_id, b.agent_id);
                }
            }
        }
        topo
    }

    fn link(&mut self, a: AgentId, b: AgentId) {
        self.neighbors.entry(a).or_default().insert(b);
        self.neighbors.entry(b).or_default().insert(a);
    }

    /// Neighbor ids of `agent_id`, ascending. Empty for unknown or isolated agents.
    pub fn neighbors_of(&self, agent_id: AgentId) -> impl Iterator<Item = AgentId> + '_ {
        self.neighbors.get(&agent_id).into_iter().flat_map(|set| set.iter().copied())
    }

    pub fn neighbor_count(&self, agent_id: AgentId) -> usize {
        self.neighbors.get(&agent_id).map_or(0, BTreeSet::len)
    }

    pub fn are_neighbors(&self, a: AgentId, b: AgentId) -> bool {
        self.neighbors.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Cached planar distance; `None` unless both agents had a BSM this cycle.
    pub fn distance(&self, a: AgentId, b: AgentId) -> Option<f64> {
        self.distances.get(&PairKey::new(a, b)).copied()
    }

    /// Directed adjacency edges `(subject, neighbor)`, both directions of every link.
    pub fn edges(&self) -> impl Iterator<Item = (AgentId, AgentId)> + '_ {
        self.neighbors
            .iter()
            .flat_map(|(a, set)| set.iter().map(move |b| (*a, *b)))
    }

    /// Copy with one agent removed everywhere (its entry, its links, its distances).
    pub fn without(&self, agent_id: AgentId) -> Self {
        let mut next = self.clone();
        next.neighbors.remove(&agent_id);
        for set in next.neighbors.values_mut() {
            set.remove(&agent_id);
        }
        next.distances.retain(|key, _| !key.contains(agent_id));
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsm_types::{KinematicSample, MotionHistory, Vec3};
    use proptest::prelude::*;

    fn bsm(id: AgentId, x: f64, y: f64) -> BasicSafetyMessage {
        let sample = KinematicSample { position: Vec3::new(x, y, 0.0), ..Default::default() };
        BasicSafetyMessage::build(id, &sample, MotionHistory::default(), 0.0, 0, 0.0)
    }

    #[test]
    fn test_pair_key_is_canonical() {
        assert_eq!(PairKey::new(7, 3), PairKey::new(3, 7));
        assert!(PairKey::new(7, 3).contains(3));
        assert!(!PairKey::new(7, 3).contains(4));
    }

    #[test]
    fn test_range_boundary() {
        let set = [bsm(1, 0.0, 0.0), bsm(2, 30.0, 0.0), bsm(3, 0.0, 60.0), bsm(4, 50.0, 0.0)];
        let topo = NetworkTopology::rebuild(&set, 50.0);
        assert!(topo.are_neighbors(1, 2));
        assert!(!topo.are_neighbors(1, 3));
        // Exactly at range counts
        assert!(topo.are_neighbors(1, 4));
        assert_eq!(topo.distance(1, 3), Some(60.0));
        assert_eq!(topo.distance(3, 1), Some(60.0));
    }

    #[test]
    fn test_three_four_five_distance() {
        let set = [bsm(1, 0.0, 0.0), bsm(2, 30.0, 40.0)];
        let topo = NetworkTopology::rebuild(&set, 150.0);
        assert_eq!(topo.distance(1, 2), Some(50.0));
    }

    #[test]
    fn test_isolated_agent_has_empty_entry() {
        let set = [bsm(1, 0.0, 0.0), bsm(2, 500.0, 0.0)];
        let topo = NetworkTopology::rebuild(&set, 150.0);
        assert_eq!(topo.neighbors.len(), 2);
        assert_eq!(topo.neighbor_count(1), 0);
        assert_eq!(topo.neighbors_of(99).count(), 0);
        assert_eq!(topo.distance(1, 1), None);
    }

    #[test]
    fn test_coincident_agents_are_neighbors() {
        let set = [bsm(1, 3.0, 3.0), bsm(2, 3.0, 3.0)];
        let topo = NetworkTopology::rebuild(&set, 10.0);
        assert!(topo.are_neighbors(1, 2));
        assert_eq!(topo.distance(1, 2), Some(0.0));
    }

    #[test]
    fn test_without_removes_every_trace() {
        let set = [bsm(1, 0.0, 0.0), bsm(2, 25.0, 0.0), bsm(3, 60.0, 0.0)];
        let topo = NetworkTopology::rebuild(&set, 50.0).without(2);
        assert_eq!(topo.neighbor_count(1), 0);
        assert_eq!(topo.neighbor_count(3), 0);
        assert_eq!(topo.distance(1, 2), None);
        assert_eq!(topo.distance(1, 3), Some(60.0));
        assert_eq!(topo.edges().count(), 0);
    }

    proptest! {
        #[test]
        fn prop_adjacency_is_symmetric_and_range_exact(
            points in prop::collection::vec((-200.0f64..200.0, -200.0f64..200.0), 1..16),
            range in 1.0f64..150.0,
        ) {
            let set: Vec<_> = points.iter().enumerate()
                .map(|(i, (x, y))| bsm(i as AgentId, *x, *y))
                .collect();
            let topo = NetworkTopology::rebuild(&set, range);

            for a in &set {
                for b in &set {
                    if a.agent_id == b.agent_id { continue; }
                    let ab = topo.are_neighbors(a.agent_id, b.agent_id);
                    prop_assert_eq!(ab, topo.are_neighbors(b.agent_id, a.agent_id));
                    let d = topo.distance(a.agent_id, b.agent_id);
                    prop_assert!(d.is_some());
                    prop_assert_eq!(ab, d.unwrap_or(f64::INFINITY) <= range);
                }
                prop_assert!(!topo.are_neighbors(a.agent_id, a.agent_id));
            }
        }
    }
}
