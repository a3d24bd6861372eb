//! Ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics, shared by every adapter of a pipeline.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Raw buffers handed over by sources
    pub buffers_received: AtomicU64,

    /// Fragments produced by the decoder
    pub fragments_decoded: AtomicU64,

    /// Buffers rejected as a whole
    pub decode_errors: AtomicU64,

    /// Single events skipped inside otherwise good buffers
    pub events_rejected: AtomicU64,

    /// Events that could not be forwarded (receiver gone)
    pub send_failures: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_buffer(&self) {
        self.buffers_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fragments(&self, count: usize) {
        self.fragments_decoded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_events(&self, count: usize) {
        self.events_rejected
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            buffers_received: self.buffers_received.load(Ordering::Relaxed),
            fragments_decoded: self.fragments_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub buffers_received: u64,
    pub fragments_decoded: u64,
    pub decode_errors: u64,
    pub events_rejected: u64,
    pub send_failures: u64,
}
