//! Per-node fragment queues
//!
//! Decoded fragments wait here until the correlator drains them. One FIFO
//! per configured node; order within a node is preserved.

use std::collections::{HashMap, VecDeque};

use contracts::{Fragment, FragmentSource, NodeId};

use crate::error::{IngestionError, Result};

#[derive(Debug, Default)]
pub struct NodeQueues {
    queues: HashMap<NodeId, VecDeque<Fragment>>,
}

impl NodeQueues {
    /// One empty queue per node.
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            queues: nodes.into_iter().map(|n| (n, VecDeque::new())).collect(),
        }
    }

    /// Append fragments to `node`'s queue.
    ///
    /// # Errors
    /// `UnknownNode` when `node` has no queue; nothing is enqueued then.
    pub fn push(&mut self, node: NodeId, fragments: impl IntoIterator<Item = Fragment>) -> Result<usize> {
        let queue = self
            .queues
            .get_mut(&node)
            .ok_or(IngestionError::UnknownNode { node })?;
        let before = queue.len();
        queue.extend(fragments);
        Ok(queue.len() - before)
    }

    pub fn len(&self, node: NodeId) -> usize {
        self.queues.get(&node).map_or(0, VecDeque::len)
    }

    pub fn total_len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.queues.contains_key(&node)
    }
}

impl FragmentSource for NodeQueues {
    fn pop(&mut self, node: NodeId) -> Option<Fragment> {
        self.queues.get_mut(&node)?.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(node: u16, ts: u32) -> Fragment {
        Fragment::physics(NodeId::new(node), ts, Vec::<u8>::new())
    }

    #[test]
    fn test_fifo_per_node() {
        let mut queues = NodeQueues::new([NodeId::new(1), NodeId::new(2)]);
        queues.push(NodeId::new(1), [frag(1, 10), frag(1, 11)]).unwrap();
        queues.push(NodeId::new(2), [frag(2, 20)]).unwrap();

        assert_eq!(queues.total_len(), 3);
        assert_eq!(queues.pop(NodeId::new(1)).unwrap().timestamp(), Some(10));
        assert_eq!(queues.pop(NodeId::new(1)).unwrap().timestamp(), Some(11));
        assert!(queues.pop(NodeId::new(1)).is_none());
        assert_eq!(queues.len(NodeId::new(2)), 1);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut queues = NodeQueues::new([NodeId::new(1)]);
        let err = queues.push(NodeId::new(9), [frag(9, 0)]).unwrap_err();
        assert!(matches!(err, IngestionError::UnknownNode { .. }));
        assert!(queues.is_empty());
        assert!(queues.pop(NodeId::new(9)).is_none());
    }
}
