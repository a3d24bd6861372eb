//! Dispatcher - main loop for fan-out to sinks

use std::collections::HashSet;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{AssembledEvent, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Final per-sink counters, reported when the dispatcher stops
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Events received from the forwarder
    pub events: u64,
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<AssembledEvent>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<AssembledEvent>) -> Self {
        Self { config, input_rx }
    }

    /// Build and start the dispatcher
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config)?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    fn initialize_handles(config: &DispatcherConfig) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut names = HashSet::new();
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            if !names.insert(sink_config.name.as_str()) {
                return Err(DispatcherError::DuplicateSink {
                    name: sink_config.name.clone(),
                });
            }
            handles.push(create_sink_handle(sink_config)?);
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sample_every = config
                .params
                .get("sample_every")
                .map(|v| v.parse::<u64>())
                .transpose()
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?
                .unwrap_or(1);
            let sink = LogSink::new(&config.name).with_sample_every(sample_every);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// The main Dispatcher that fans out events to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<AssembledEvent>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<AssembledEvent>,
    ) -> Self {
        Self { handles, input_rx }
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Consumes events from input and fans out to all sinks.
    /// Returns when the input channel is closed and every sink has drained.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut event_count: u64 = 0;

        while let Some(event) = self.input_rx.recv().await {
            event_count += 1;
            self.dispatch_event(event).await;

            if event_count.is_multiple_of(1000) {
                debug!(events = event_count, "Dispatcher progress");
            }
        }

        info!(
            events = event_count,
            "Dispatcher input closed, shutting down"
        );

        let metrics: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().clone()))
            .collect();
        Self::shutdown_handles(self.handles).await;

        info!("Dispatcher shutdown complete");

        DispatchReport {
            events: event_count,
            sinks: metrics
                .into_iter()
                .map(|(name, m)| (name, m.snapshot()))
                .collect(),
        }
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    async fn dispatch_event(&self, event: AssembledEvent) {
        if let Some((last, rest)) = self.handles.split_last() {
            for handle in rest {
                handle.deliver(event.clone()).await;
            }
            last.deliver(event).await;
        }
    }

    async fn shutdown_handles(handles: Vec<SinkHandle>) {
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<AssembledEvent>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}
