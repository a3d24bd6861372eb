//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - `EventForwarder`：关联器的同步提交端 (大小/类型检查，非阻塞入队)
//! - 消费 `AssembledEvent`，Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞主链路

pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{AssembledEvent, EventSink};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use forwarder::EventForwarder;
pub use handle::{Delivery, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{read_event_file, FileSink, FileSinkConfig, LogSink};
