//! stats.rs — Network-wide counters folded in once per performed cycle

use serde::{Deserialize, Serialize};

/// Aggregate counters. Reset only when a coordinator is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatistics {
    /// BSMs produced over the coordinator's lifetime
    pub total_messages_sent: u64,
    /// Mean neighbor count over registered agents, last cycle
    pub average_neighbors: f64,
    pub max_neighbors: usize,
    /// One per recipient of every cooperative share
    pub cooperative_shares: u64,
    pub update_cycles: u64,
}

impl NetworkStatistics {
    /// Fold one performed cycle in. `neighbor_counts` has one entry per registered agent.
    pub fn record_cycle(&mut self, refreshed: usize, neighbor_counts: impl IntoIterator<Item = usize>) {
        let counts: Vec<usize> = neighbor_counts.into_iter().collect();
        if counts.is_empty() {
            self.average_neighbors = 0.0;
            self.max_neighbors = 0;
        } else {
            self.average_neighbors = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
            self.max_neighbors = counts.iter().copied().max().unwrap_or(0);
        }
        self.total_messages_sent += refreshed as u64;
        self.update_cycles += 1;
    }

    pub fn record_shares(&mut self, recipients: usize) {
        self.cooperative_shares += recipients as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle() {
        let mut s = NetworkStatistics::default();
        s.record_cycle(3, [2, 1, 1]);
        assert_eq!(s.total_messages_sent, 3);
        assert!((s.average_neighbors - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.max_neighbors, 2);
        assert_eq!(s.update_cycles, 1);

        s.record_cycle(2, [0, 0, 0]);
        assert_eq!(s.total_messages_sent, 5);
        assert_eq!(s.average_neighbors, 0.0);
        assert_eq!(s.max_neighbors, 0);
    }

    #[test]
    fn test_empty_cycle_zeroes_snapshot() {
        let mut s = NetworkStatistics { average_neighbors: 2.0, max_neighbors: 4, ..Default::default() };
        s.record_cycle(0, []);
        assert_eq!(s.average_neighbors, 0.0);
        assert_eq!(s.max_neighbors, 0);
        assert_eq!(s.update_cycles, 1);
    }

    #[test]
    fn test_shares_accumulate() {
        let mut s = NetworkStatistics::default();
        s.record_shares(2);
        s.record_shares(3);
        assert_eq!(s.cooperative_shares, 5);
    }
}
