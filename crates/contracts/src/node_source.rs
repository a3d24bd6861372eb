//! NodeSource trait - raw buffer transport abstraction
//!
//! One source per front-end node. A source hands raw, still-encoded
//! buffers to a callback; decoding happens downstream.

use bytes::Bytes;
use std::sync::Arc;

use crate::NodeId;

/// Raw buffer callback type
///
/// Called once per buffer received from the node, on the source's own thread.
pub type RawBufferCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Raw buffer transport of one node
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn NodeSource> = open_node(0x5555);
/// source.listen(Arc::new(|buffer| {
///     println!("received {} bytes", buffer.len());
/// }));
/// // ... run ...
/// source.stop();
/// ```
pub trait NodeSource: Send + Sync {
    /// Node this source delivers buffers for
    fn node_id(&self) -> NodeId;

    /// Start delivering buffers to `callback`
    ///
    /// Calling it again while already listening is a no-op.
    fn listen(&self, callback: RawBufferCallback);

    /// Stop delivering buffers
    fn stop(&self);

    fn is_listening(&self) -> bool;

    /// True once the source has delivered everything it will ever deliver.
    fn is_finished(&self) -> bool {
        false
    }
}
