//! Node scoreboard: which member nodes have contributed to one assembly.
//!
//! The node -> bit table (`ScoreboardLayout`) is built once per configuration
//! epoch and shared by every assembly of that epoch through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{ContractError, NodeId};

/// Capacity of the 32-bit contribution mask.
pub const MAX_MEMBER_NODES: usize = 32;

/// Node -> bit assignment plus the mask of required members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreboardLayout {
    bits: HashMap<NodeId, u32>,
    required: u32,
}

impl ScoreboardLayout {
    /// Assign each distinct node a single bit, in order.
    ///
    /// # Errors
    /// `TooManyNodes` when more than [`MAX_MEMBER_NODES`] distinct nodes are given.
    pub fn configure<I>(node_ids: I) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut bits = HashMap::new();
        for id in node_ids {
            let next = bits.len();
            bits.entry(id).or_insert(next);
        }

        if bits.len() > MAX_MEMBER_NODES {
            return Err(ContractError::TooManyNodes {
                count: bits.len(),
                max: MAX_MEMBER_NODES,
            });
        }

        let bits: HashMap<NodeId, u32> = bits
            .into_iter()
            .map(|(id, index)| (id, 1u32 << index))
            .collect();
        let required = bits.values().fold(0, |mask, bit| mask | bit);

        Ok(Self { bits, required })
    }

    #[inline]
    pub fn bit(&self, node: NodeId) -> Option<u32> {
        self.bits.get(&node).copied()
    }

    #[inline]
    pub fn required_mask(&self) -> u32 {
        self.required
    }

    pub fn member_count(&self) -> usize {
        self.bits.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.bits.contains_key(&node)
    }
}

/// Contribution mask of one in-progress assembly.
#[derive(Debug, Clone)]
pub struct NodeScoreboard {
    layout: Arc<ScoreboardLayout>,
    contributed: u32,
}

impl NodeScoreboard {
    pub fn new(layout: Arc<ScoreboardLayout>) -> Self {
        Self {
            layout,
            contributed: 0,
        }
    }

    /// Mark `node` as having contributed.
    ///
    /// # Errors
    /// `UnknownNode` if `node` is not part of this layout.
    pub fn add_node(&mut self, node: NodeId) -> Result<(), ContractError> {
        let bit = self
            .layout
            .bit(node)
            .ok_or_else(|| ContractError::unknown_node(node))?;
        self.contributed |= bit;
        Ok(())
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        let required = self.layout.required_mask();
        (self.contributed & required) == required
    }

    pub fn has_contributed(&self, node: NodeId) -> bool {
        self.layout
            .bit(node)
            .is_some_and(|bit| self.contributed & bit != 0)
    }

    pub fn contributed_mask(&self) -> u32 {
        self.contributed
    }

    /// Clear contributions; the layout is untouched.
    pub fn reset(&mut self) {
        self.contributed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(ids: &[u16]) -> Arc<ScoreboardLayout> {
        Arc::new(ScoreboardLayout::configure(ids.iter().copied().map(NodeId::new)).unwrap())
    }

    #[test]
    fn test_complete_only_when_all_members_contributed() {
        let mut board = NodeScoreboard::new(layout(&[0x5555, 0xaaaa, 0xbbbb]));
        assert!(!board.is_complete());

        board.add_node(NodeId::new(0x5555)).unwrap();
        board.add_node(NodeId::new(0xbbbb)).unwrap();
        assert!(!board.is_complete());
        assert!(!board.has_contributed(NodeId::new(0xaaaa)));

        board.add_node(NodeId::new(0xaaaa)).unwrap();
        assert!(board.is_complete());
    }

    #[test]
    fn test_repeat_contribution_is_harmless() {
        let mut board = NodeScoreboard::new(layout(&[1, 2]));
        board.add_node(NodeId::new(1)).unwrap();
        board.add_node(NodeId::new(1)).unwrap();
        assert!(!board.is_complete());
        assert_eq!(board.contributed_mask().count_ones(), 1);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut board = NodeScoreboard::new(layout(&[1, 2]));
        let err = board.add_node(NodeId::new(3)).unwrap_err();
        assert!(matches!(err, ContractError::UnknownNode { node } if node == NodeId::new(3)));
        assert_eq!(board.contributed_mask(), 0);
    }

    #[test]
    fn test_thirty_two_members_fit() {
        let ids: Vec<u16> = (0..32).collect();
        let shared = layout(&ids);
        assert_eq!(shared.required_mask(), u32::MAX);

        let mut board = NodeScoreboard::new(shared);
        for id in 0..31u16 {
            board.add_node(NodeId::new(id)).unwrap();
            assert!(!board.is_complete());
        }
        board.add_node(NodeId::new(31)).unwrap();
        assert!(board.is_complete());
    }

    #[test]
    fn test_thirty_three_members_fail() {
        let err = ScoreboardLayout::configure((0..33u16).map(NodeId::new)).unwrap_err();
        assert!(matches!(
            err,
            ContractError::TooManyNodes { count: 33, max: 32 }
        ));
    }

    #[test]
    fn test_reset_keeps_layout() {
        let shared = layout(&[7, 8]);
        let mut board = NodeScoreboard::new(shared.clone());
        board.add_node(NodeId::new(7)).unwrap();
        board.add_node(NodeId::new(8)).unwrap();
        assert!(board.is_complete());

        board.reset();
        assert!(!board.is_complete());
        assert_eq!(board.contributed_mask(), 0);
        assert!(shared.contains(NodeId::new(8)));

        board.add_node(NodeId::new(7)).unwrap();
        board.add_node(NodeId::new(8)).unwrap();
        assert!(board.is_complete());
    }

    #[test]
    fn test_independent_layouts_do_not_interfere() {
        let a = layout(&[1, 2]);
        let b = layout(&[3]);
        let mut board_b = NodeScoreboard::new(b);
        assert!(board_b.add_node(NodeId::new(1)).is_err());
        board_b.add_node(NodeId::new(3)).unwrap();
        assert!(board_b.is_complete());
        assert!(!a.contains(NodeId::new(3)));
    }
}
