//! NodeId - 16-bit front-end node identifier
//!
//! Copy-sized newtype; displays as `0x%04x` to match how operators label nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one front-end node.
///
/// # Examples
/// ```
/// use contracts::NodeId;
///
/// let id = NodeId::new(0x5555);
/// assert_eq!(id.get(), 0x5555);
/// assert_eq!(id.to_string(), "0x5555");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u16);

impl NodeId {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw 16-bit value as carried in the wire header.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for NodeId {
    #[inline]
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<NodeId> for u16 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:#06x})", self.0)
    }
}
