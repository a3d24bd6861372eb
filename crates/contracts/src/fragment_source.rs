//! FragmentSource - per-node fragment queues consumed by the correlator

use serde::{Deserialize, Serialize};

use crate::{Fragment, NodeId};

/// Why the correlator is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceNotice {
    /// The node's queue has new fragments; drain it fully.
    NewFragments(NodeId),
    Starting,
    ShuttingDown,
    /// The node's transport failed.
    Error(NodeId),
}

/// Pull side of the per-node queues.
pub trait FragmentSource {
    /// Oldest queued fragment for `node`, if any.
    fn pop(&mut self, node: NodeId) -> Option<Fragment>;
}

impl<T: FragmentSource + ?Sized> FragmentSource for &mut T {
    fn pop(&mut self, node: NodeId) -> Option<Fragment> {
        (**self).pop(node)
    }
}
