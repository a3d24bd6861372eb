//! # Ingestion Pipeline
//!
//! Node buffer ingestion.
//!
//! Responsibilities:
//! - Register one raw buffer source per node (mock or real transport)
//! - Decode wire records into typed `Fragment`s, in either byte order
//! - Forward decoded fragments to one consumer via async-channel
//! - Hold per-node fragment queues for the correlator
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockNodeConfig, MockNodeSource, NodeQueues, SourceEvent};
//!
//! let mut pipeline = IngestionPipeline::new();
//! pipeline.register_node_source(Box::new(MockNodeSource::new(MockNodeConfig::default())));
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all();
//!
//! let mut queues = NodeQueues::new(pipeline.nodes());
//! while let Ok(SourceEvent::Fragments { node, fragments }) = rx.recv().await {
//!     queues.push(node, fragments)?;
//!     // notify the correlator
//! }
//! ```

mod adapter;
pub mod codec;
mod error;
mod generic_adapter;
mod counters;
mod mock;
mod pipeline;
mod queue;

// Re-exports
pub use adapter::{NodeAdapter, SourceEvent};
pub use codec::{decode_buffer, BufferEncoder, DecodedBuffer, RecordHeader};
pub use error::{IngestionError, Result};
pub use generic_adapter::GenericNodeAdapter;
pub use counters::{IngestionMetrics, MetricsSnapshot};
pub use mock::{MockNodeConfig, MockNodeSource};
pub use pipeline::IngestionPipeline;
pub use queue::NodeQueues;
