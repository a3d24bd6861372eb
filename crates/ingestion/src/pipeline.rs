//! Ingestion Pipeline main entry

use std::collections::BTreeMap;
use std::sync::Arc;

use async_channel::{unbounded, Receiver, Sender};
use contracts::{NodeId, NodeSource};
use tracing::{debug, info, instrument};

use crate::adapter::{NodeAdapter, SourceEvent};
use crate::counters::IngestionMetrics;
use crate::generic_adapter::GenericNodeAdapter;

/// Ingestion Pipeline
///
/// Manages one adapter per node and merges their output into a single
/// unbounded stream of [`SourceEvent`]s.
pub struct IngestionPipeline {
    /// Registered adapters
    adapters: BTreeMap<NodeId, Box<dyn NodeAdapter>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Event sender (shared by all adapters)
    tx: Sender<SourceEvent>,

    /// Event receiver
    rx: Option<Receiver<SourceEvent>>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();

        Self {
            adapters: BTreeMap::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx,
            rx: Some(rx),
        }
    }

    /// Register the raw buffer source of one node.
    ///
    /// A second source for the same node replaces the first.
    #[instrument(
        name = "ingestion_register_node_source",
        skip(self, source),
        fields(node = %source.node_id())
    )]
    pub fn register_node_source(&mut self, source: Box<dyn NodeSource>) {
        let adapter = GenericNodeAdapter::new(source);
        let node = adapter.node_id();
        debug!(node = %node, "registered node source");
        if let Some(old) = self.adapters.insert(node, Box::new(adapter)) {
            old.stop();
        }
    }

    /// Start all registered nodes
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.adapters.len(), "starting all node adapters");
        for (node, adapter) in &self.adapters {
            if !adapter.is_listening() {
                debug!(node = %node, "starting adapter");
                adapter.start(self.tx.clone(), self.metrics.clone());
            }
        }
    }

    /// Stop all nodes
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.adapters.len(), "stopping all node adapters");
        for (node, adapter) in &self.adapters {
            if adapter.is_listening() {
                debug!(node = %node, "stopping adapter");
                adapter.stop();
            }
        }
    }

    /// Get event stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<SourceEvent>> {
        self.rx.take()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn node_count(&self) -> usize {
        self.adapters.len()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.adapters.keys().copied().collect()
    }

    pub fn is_node_listening(&self, node: NodeId) -> bool {
        self.adapters
            .get(&node)
            .map(|a| a.is_listening())
            .unwrap_or(false)
    }

    /// True when every registered source has delivered all it will deliver.
    pub fn all_finished(&self) -> bool {
        self.adapters.values().all(|a| a.is_finished())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNodeConfig, MockNodeSource};
    use std::time::Duration;

    #[test]
    fn test_pipeline_creation() {
        let pipeline = IngestionPipeline::new();
        assert_eq!(pipeline.node_count(), 0);
        assert!(pipeline.all_finished());
    }

    #[test]
    fn test_take_receiver_once() {
        let mut pipeline = IngestionPipeline::new();
        assert!(pipeline.take_receiver().is_some());
        assert!(pipeline.take_receiver().is_none());
    }

    #[tokio::test]
    async fn test_mock_sources_flow_through() {
        let mut pipeline = IngestionPipeline::new();
        for node in [0x5555u16, 0xaaaa] {
            let config = MockNodeConfig {
                node: NodeId::new(node),
                rate_hz: 1000.0,
                buffers_per_run: 3,
                ..Default::default()
            };
            pipeline.register_node_source(Box::new(MockNodeSource::new(config)));
        }
        assert_eq!(pipeline.nodes(), vec![NodeId::new(0x5555), NodeId::new(0xaaaa)]);

        let rx = pipeline.take_receiver().unwrap();
        pipeline.start_all();
        assert!(pipeline.is_node_listening(NodeId::new(0x5555)));

        // Begin + 3 physics + End per node
        let mut received = 0;
        while received < 10 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out")
                .unwrap();
            assert!(matches!(event, SourceEvent::Fragments { .. }));
            received += 1;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.all_finished());
        assert_eq!(pipeline.metrics().snapshot().buffers_received, 10);
        pipeline.stop_all();
    }
}
