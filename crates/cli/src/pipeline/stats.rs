//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::CorrelatorStats;
use dispatcher::DispatchReport;
use ingestion::MetricsSnapshot;
use observability::EventMetricsAggregator;
use serde::Serialize;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Events accepted by the forwarder
    pub events_forwarded: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Configured nodes
    pub active_nodes: usize,

    /// Configured sinks
    pub active_sinks: usize,

    /// Ingestion counters at shutdown
    pub ingestion: MetricsSnapshot,

    /// Correlator counters at shutdown
    pub correlator: CorrelatorStats,

    /// Per-sink counters, present when the dispatcher drained in time
    pub dispatch: Option<DispatchReport>,

    /// Output event aggregator
    pub events: EventMetricsAggregator,
}

/// Flat JSON view of [`PipelineStats`]
#[derive(Debug, Serialize)]
pub struct StatsReport<'a> {
    pub duration_secs: f64,
    pub events_per_sec: f64,
    pub events_forwarded: u64,
    pub buffers_received: u64,
    pub fragments_decoded: u64,
    pub decode_errors: u64,
    pub correlator: &'a CorrelatorStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<&'a DispatchReport>,
}

impl PipelineStats {
    /// Committed events per second
    pub fn event_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_forwarded as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of received fragments that were discarded, in percent
    pub fn discard_rate(&self) -> f64 {
        let total = self.correlator.total_fragments();
        if total > 0 {
            self.correlator.total_discarded() as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn report(&self) -> StatsReport<'_> {
        StatsReport {
            duration_secs: self.duration.as_secs_f64(),
            events_per_sec: self.event_rate(),
            events_forwarded: self.events_forwarded,
            buffers_received: self.ingestion.buffers_received,
            fragments_decoded: self.ingestion.fragments_decoded,
            decode_errors: self.ingestion.decode_errors,
            correlator: &self.correlator,
            dispatch: self.dispatch.as_ref(),
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  Event Builder Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events forwarded: {}", self.events_forwarded);
        println!("   ├─ Event rate: {:.2}/s", self.event_rate());
        println!("   ├─ Active nodes: {}", self.active_nodes);
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n📥 Ingestion");
        println!("   ├─ Buffers received: {}", self.ingestion.buffers_received);
        println!("   ├─ Fragments decoded: {}", self.ingestion.fragments_decoded);
        println!("   ├─ Buffers rejected: {}", self.ingestion.decode_errors);
        println!("   └─ Events too small: {}", self.ingestion.events_rejected);

        let c = &self.correlator;
        println!("\n🔗 Correlator");
        println!("   ├─ Fragments: {}", c.total_fragments());
        println!("   ├─ Committed: {}", c.total_completed());
        println!(
            "   ├─ Discarded: {} ({:.2}%)",
            c.total_discarded(),
            self.discard_rate()
        );
        println!("   ├─ Rejected: {}", c.total_rejected());
        println!("   └─ Refused by output: {}", c.sink_rejected);

        if !c.fragments_by_node.is_empty() {
            println!("\n🛰  Per node (received / discarded)");
            for (node, received) in &c.fragments_by_node {
                println!("   ├─ {}: {} / {}", node, received, c.discarded(*node));
            }
        }

        if let Some(report) = &self.dispatch {
            println!("\n📤 Sinks");
            for (name, snapshot) in &report.sinks {
                println!(
                    "   ├─ {}: written={} failed={} dropped={} runs closed={}",
                    name,
                    snapshot.write_count,
                    snapshot.failure_count,
                    snapshot.dropped_count,
                    snapshot.runs_closed
                );
            }
        }

        println!("\n{}", self.events.summary());
    }
}
