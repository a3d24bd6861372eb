//! Pipeline orchestrator - coordinates all components.
//!
//! One mock source per configured node feeds the ingestion pipeline. A single
//! consumer loop owns the node queues and the correlator, so every correlator
//! call is serialized. Committed events go through the forwarder to the
//! dispatcher task.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_channel::Receiver;
use contracts::{AssembledEvent, DaqBlueprint, OutputSink, SinkError, SourceNotice};
use dispatcher::EventForwarder;
use event_builder::Correlator;
use ingestion::{IngestionPipeline, MockNodeConfig, MockNodeSource, NodeQueues, SourceEvent};
use observability::EventMetricsAggregator;
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// How often the consumer loop advances the pruning clock while idle
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: DaqBlueprint,

    /// Stop after this many forwarded events (None = unlimited)
    pub max_events: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Forwarder to dispatcher channel capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Forwarder that also feeds the output metrics
struct MeteredOutput {
    forwarder: EventForwarder,
    events: EventMetricsAggregator,
}

impl OutputSink for MeteredOutput {
    fn submit(&mut self, event: AssembledEvent) -> Result<(), SinkError> {
        let copy = event.clone();
        self.forwarder.submit(event)?;
        observability::record_event_metrics(&copy);
        self.events.update(&copy);
        Ok(())
    }
}

/// Everything the consumer loop mutates
struct Consumer {
    correlator: Correlator,
    queues: NodeQueues,
    output: MeteredOutput,
}

impl Consumer {
    fn notice(&mut self, notice: SourceNotice) {
        self.correlator
            .handle_notice(notice, &mut self.queues, &mut self.output, Instant::now());
    }

    fn on_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Fragments { node, fragments } => {
                observability::record_buffer_decoded(node, fragments.len());
                if fragments.is_empty() {
                    return;
                }
                match self.queues.push(node, fragments) {
                    Ok(_) => {
                        observability::record_queue_depth(node, self.queues.len(node));
                        self.notice(SourceNotice::NewFragments(node));
                    }
                    Err(e) => warn!(node = %node, error = %e, "fragments for unconfigured node dropped"),
                }
            }
            SourceEvent::Failed { node, error } => {
                observability::record_decode_error(node, error.kind_label());
                warn!(node = %node, error = %error, "buffer rejected");
                self.notice(SourceNotice::Error(node));
            }
        }
    }

    fn forwarded(&self) -> u64 {
        self.output.forwarder.forwarded()
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until every source finished, the event limit or the
    /// timeout is reached.
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        // Correlator
        let correlator = Correlator::new(blueprint.to_correlator_config())
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;
        info!(trigger = %correlator.trigger_node(), "Correlator configured");

        // Dispatcher
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - committed events will only be counted");
        }
        let (forwarder, event_rx) =
            EventForwarder::channel(&blueprint.output, self.config.buffer_size);
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), event_rx)
            .await
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();
        info!(sinks = blueprint.sinks.len(), "Dispatcher started");

        // Ingestion
        let mut ingestion = IngestionPipeline::new();
        for node in &blueprint.nodes {
            let config = MockNodeConfig::from_blueprint(node, &blueprint.source);
            debug!(node = %config.node, buffers = config.total_buffers(), "mock source configured");
            ingestion.register_node_source(Box::new(MockNodeSource::new(config)));
        }
        let source_rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;

        let mut consumer = Consumer {
            correlator,
            queues: NodeQueues::new(blueprint.node_ids()),
            output: MeteredOutput {
                forwarder,
                events: EventMetricsAggregator::new(),
            },
        };

        consumer.notice(SourceNotice::Starting);
        ingestion.start_all();
        info!(nodes = ingestion.node_count(), max_events = ?self.config.max_events, "Pipeline running");

        let run = consume(&mut consumer, &ingestion, &source_rx, self.config.max_events);
        match self.config.timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, run).await.is_err() {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                }
            }
            None => run.await,
        }

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.stop_all();
        consumer.notice(SourceNotice::ShuttingDown);

        let correlator_stats = consumer.correlator.statistics();
        observability::record_correlator_stats(&correlator_stats);

        let Consumer { output, .. } = consumer;
        let events_forwarded = output.forwarder.forwarded();
        // Dropping the forwarder closes the dispatcher input.
        drop(output.forwarder);

        let dispatch = match tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                None
            }
            Err(_) => {
                warn!("Dispatcher did not drain within 5s");
                None
            }
        };

        let stats = PipelineStats {
            events_forwarded,
            duration: start_time.elapsed(),
            active_nodes: blueprint.nodes.len(),
            active_sinks: blueprint.sinks.len(),
            ingestion: ingestion.metrics().snapshot(),
            correlator: correlator_stats,
            dispatch,
            events: output.events,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            events = stats.events_forwarded,
            rate = format!("{:.2}", stats.event_rate()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Consumer loop: drain source events into the correlator, tick the pruning
/// clock, and stop once every source finished and the channel is empty.
async fn consume(
    consumer: &mut Consumer,
    ingestion: &IngestionPipeline,
    source_rx: &Receiver<SourceEvent>,
    max_events: Option<u64>,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = source_rx.recv() => match received {
                Ok(event) => consumer.on_source_event(event),
                Err(_) => break,
            },
            _ = ticker.tick() => {
                let pruned = consumer.correlator.advance_clock(Instant::now());
                if pruned > 0 {
                    debug!(pruned, "stale fragments pruned");
                }
                if ingestion.all_finished() && source_rx.is_empty() {
                    info!("All node sources finished");
                    break;
                }
            }
        }

        if let Some(max) = max_events {
            if consumer.forwarded() >= max {
                info!(events = consumer.forwarded(), "Reached max events limit");
                break;
            }
        }
    }
}
