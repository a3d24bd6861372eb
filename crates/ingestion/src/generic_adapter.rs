//! 通用节点适配器
//!
//! 基于 `NodeSource` trait 的统一适配器实现：原始缓冲在数据源线程上解码，
//! 解码结果经通道送往唯一的消费端。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::Sender;
use bytes::Bytes;
use contracts::{NodeId, NodeSource, RawBufferCallback};
use tracing::{debug, trace, warn};

use crate::adapter::{NodeAdapter, SourceEvent};
use crate::codec::decode_buffer;
use crate::counters::IngestionMetrics;
use crate::error::IngestionError;

/// 通用节点适配器
///
/// 将 `NodeSource` 适配为 `NodeAdapter`。
pub struct GenericNodeAdapter {
    node: NodeId,
    source: Box<dyn NodeSource>,
    listening: Arc<AtomicBool>,
}

impl GenericNodeAdapter {
    pub fn new(source: Box<dyn NodeSource>) -> Self {
        Self {
            node: source.node_id(),
            source,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl NodeAdapter for GenericNodeAdapter {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn start(&self, tx: Sender<SourceEvent>, metrics: Arc<IngestionMetrics>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let node = self.node;
        let listening = self.listening.clone();

        debug!(node = %node, "starting node adapter");

        let callback: RawBufferCallback = Arc::new(move |buffer| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            metrics.record_buffer();
            let event = decode_event(node, &buffer, &metrics);
            send_event(&tx, event, &metrics);
        });

        self.source.listen(callback);
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(node = %self.node, "stopping node adapter");
            self.source.stop();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.source.is_finished()
    }
}

/// 解码一个缓冲；缓冲头中的节点必须与数据源一致。
fn decode_event(node: NodeId, buffer: &Bytes, metrics: &IngestionMetrics) -> SourceEvent {
    let decoded = match decode_buffer(buffer) {
        Ok(decoded) => decoded,
        Err(error) => {
            metrics.record_decode_error();
            return SourceEvent::Failed { node, error };
        }
    };

    if decoded.header.node != node {
        metrics.record_decode_error();
        return SourceEvent::Failed {
            node,
            error: IngestionError::NodeMismatch {
                expected: node,
                found: decoded.header.node,
            },
        };
    }

    if !decoded.rejected.is_empty() {
        metrics.record_rejected_events(decoded.rejected.len());
        for error in &decoded.rejected {
            warn!(node = %node, error = %error, "event skipped");
            metrics::counter!("evb_errors_total", "kind" => error.kind_label()).increment(1);
        }
    }

    metrics.record_fragments(decoded.fragments.len());
    trace!(
        node = %node,
        sequence = decoded.header.sequence,
        fragments = decoded.fragments.len(),
        "buffer decoded"
    );

    SourceEvent::Fragments {
        node,
        fragments: decoded.fragments,
    }
}

#[inline]
fn send_event(tx: &Sender<SourceEvent>, event: SourceEvent, metrics: &IngestionMetrics) {
    if let Err(err) = tx.try_send(event) {
        metrics.record_send_failure();
        warn!(node = %err.into_inner().node(), "event channel closed");
    }
}
