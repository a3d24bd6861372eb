//! Per-sink counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::{AssembledEvent, EventBody};
use serde::Serialize;

/// Counters of a single sink worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    write_count: AtomicU64,
    failure_count: AtomicU64,
    /// Events refused because the sink queue was full
    dropped_count: AtomicU64,
    /// Id of the last event written, plus one (0 = none yet)
    last_event: AtomicU64,
    transitions_written: AtomicU64,
    /// EndRun events written and flushed
    runs_closed: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn record_write(&self, event: &AssembledEvent) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        if matches!(event.body, EventBody::StateTransition { .. }) {
            self.transitions_written.fetch_add(1, Ordering::Relaxed);
        }
        self.last_event
            .store(event.event_id.saturating_add(1), Ordering::Relaxed);
    }

    pub fn transitions_written(&self) -> u64 {
        self.transitions_written.load(Ordering::Relaxed)
    }

    pub fn runs_closed(&self) -> u64 {
        self.runs_closed.load(Ordering::Relaxed)
    }

    pub fn inc_runs_closed(&self) {
        self.runs_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Id of the most recent successfully written event
    pub fn last_event_id(&self) -> Option<u64> {
        self.last_event.load(Ordering::Relaxed).checked_sub(1)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            last_event_id: self.last_event_id(),
            transitions_written: self.transitions_written(),
            runs_closed: self.runs_closed(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub last_event_id: Option<u64>,
    pub transitions_written: u64,
    pub runs_closed: u64,
}
