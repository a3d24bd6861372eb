//! EventForwarder - synchronous commit side of the dispatcher
//!
//! The correlator commits into an [`OutputSink`]; the forwarder checks the
//! event against the output format limits and hands it to the dispatcher
//! loop without blocking.

use std::collections::BTreeSet;

use contracts::{AssembledEvent, OutputConfig, OutputSink, SinkError};
use tokio::sync::mpsc;
use tracing::trace;

/// Size/type gate in front of the dispatcher input channel
pub struct EventForwarder {
    tx: mpsc::Sender<AssembledEvent>,
    max_event_bytes: usize,
    /// Empty means every type is accepted
    accepted_types: BTreeSet<u16>,
    forwarded: u64,
}

impl EventForwarder {
    pub fn new(tx: mpsc::Sender<AssembledEvent>, output: &OutputConfig) -> Self {
        Self {
            tx,
            max_event_bytes: output.max_event_bytes,
            accepted_types: output.accepted_types.iter().copied().collect(),
            forwarded: 0,
        }
    }

    /// Forwarder plus the receiving end for [`Dispatcher`](crate::Dispatcher).
    pub fn channel(
        output: &OutputConfig,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<AssembledEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, output), rx)
    }

    /// Events handed to the dispatcher so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    fn check(&self, event: &AssembledEvent) -> Result<(), SinkError> {
        if !self.accepted_types.is_empty() && !self.accepted_types.contains(&event.type_code) {
            return Err(SinkError::UnsupportedType {
                type_code: event.type_code,
            });
        }
        let size = event.encoded_len();
        if size > self.max_event_bytes {
            return Err(SinkError::TooLarge {
                size,
                max: self.max_event_bytes,
            });
        }
        Ok(())
    }
}

impl OutputSink for EventForwarder {
    fn submit(&mut self, event: AssembledEvent) -> Result<(), SinkError> {
        self.check(&event)?;
        let event_id = event.event_id;
        match self.tx.try_send(event) {
            Ok(()) => {
                self.forwarded += 1;
                trace!(event_id, "event forwarded");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(SinkError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}
