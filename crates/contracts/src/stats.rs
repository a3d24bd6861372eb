//! Correlator statistics snapshot

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::NodeId;

/// Point-in-time copy of the correlator's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorStats {
    /// Fragments received, by node
    pub fragments_by_node: BTreeMap<NodeId, u64>,

    /// Events committed, by buffer type code
    pub completed_by_type: BTreeMap<u16, u64>,

    /// Fragments currently waiting in the unmatched queue, by node
    pub unmatched_by_node: BTreeMap<NodeId, u64>,

    /// Fragments discarded by barrier, prune, reload or shutdown, by node
    pub discarded_by_node: BTreeMap<NodeId, u64>,

    /// Fragments refused (unknown node, wrong kind), by node
    pub rejected_by_node: BTreeMap<NodeId, u64>,

    /// Events refused by the output sink
    pub sink_rejected: u64,
}

impl CorrelatorStats {
    pub fn total_fragments(&self) -> u64 {
        self.fragments_by_node.values().sum()
    }

    pub fn total_completed(&self) -> u64 {
        self.completed_by_type.values().sum()
    }

    pub fn total_discarded(&self) -> u64 {
        self.discarded_by_node.values().sum()
    }

    pub fn total_unmatched(&self) -> u64 {
        self.unmatched_by_node.values().sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected_by_node.values().sum()
    }

    pub fn completed(&self, type_code: u16) -> u64 {
        self.completed_by_type.get(&type_code).copied().unwrap_or(0)
    }

    pub fn discarded(&self, node: NodeId) -> u64 {
        self.discarded_by_node.get(&node).copied().unwrap_or(0)
    }

    /// Zero every counter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_per_key_counts() {
        let mut stats = CorrelatorStats::default();
        stats.discarded_by_node.insert(NodeId::new(1), 2);
        stats.discarded_by_node.insert(NodeId::new(2), 1);
        stats.completed_by_type.insert(1, 5);

        assert_eq!(stats.total_discarded(), 3);
        assert_eq!(stats.discarded(NodeId::new(2)), 1);
        assert_eq!(stats.discarded(NodeId::new(9)), 0);
        assert_eq!(stats.completed(1), 5);
        assert_eq!(stats.total_completed(), 5);

        stats.clear();
        assert_eq!(stats, CorrelatorStats::default());
    }
}
