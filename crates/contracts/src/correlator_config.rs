//! Correlator configuration
//!
//! The node table the correlator is built from. Immutable for one
//! configuration epoch; a reload hands the correlator a fresh value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::NodeId;

/// Default age after which incomplete state is pruned.
pub const DEFAULT_PRUNE_THRESHOLD_MS: u64 = 2000;

/// One configured front-end node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub name: String,

    /// The single node whose physics fragments open new assemblies.
    pub is_trigger: bool,

    /// Half-width of the matching window, in timestamp ticks.
    pub window_width: u32,

    /// Added (wrapping) to every physics timestamp from this node.
    pub offset: Option<i32>,
}

impl NodeDescriptor {
    /// Timestamp with this node's offset applied.
    #[inline]
    pub fn adjust(&self, raw: u32) -> u32 {
        match self.offset {
            Some(offset) => raw.wrapping_add_signed(offset),
            None => raw,
        }
    }
}

/// Everything the correlator needs for one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Ordered node table
    pub nodes: Vec<NodeDescriptor>,

    /// Maximum age of unmatched fragments and physics assemblies (ms)
    #[serde(default = "default_prune_threshold_ms")]
    pub prune_threshold_ms: u64,
}

fn default_prune_threshold_ms() -> u64 {
    DEFAULT_PRUNE_THRESHOLD_MS
}

impl CorrelatorConfig {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            nodes,
            prune_threshold_ms: DEFAULT_PRUNE_THRESHOLD_MS,
        }
    }

    pub fn with_prune_threshold(mut self, threshold: Duration) -> Self {
        self.prune_threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn prune_threshold(&self) -> Duration {
        Duration::from_millis(self.prune_threshold_ms)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Source of the ordered node table.
pub trait NodeTable {
    fn list_nodes(&self) -> Vec<NodeDescriptor>;
}

impl NodeTable for CorrelatorConfig {
    fn list_nodes(&self) -> Vec<NodeDescriptor> {
        self.nodes.clone()
    }
}
