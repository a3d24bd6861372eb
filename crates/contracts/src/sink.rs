//! Output interfaces
//!
//! `OutputSink` is what the correlator commits into (synchronous, may refuse);
//! `EventSink` is the async interface implemented by dispatcher sinks.

use thiserror::Error;

use crate::{AssembledEvent, ContractError};

/// Reasons an output sink refuses an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Event does not fit the destination format
    #[error("event of {size} bytes exceeds destination maximum of {max}")]
    TooLarge { size: usize, max: usize },

    /// Destination cannot record this buffer type
    #[error("unsupported event type {type_code}")]
    UnsupportedType { type_code: u16 },

    /// Downstream queue is full
    #[error("output queue full")]
    QueueFull,

    /// Downstream is gone
    #[error("output closed")]
    Closed,
}

/// Synchronous commit target of the correlator.
///
/// The correlator never retries a refused event.
pub trait OutputSink {
    fn submit(&mut self, event: AssembledEvent) -> Result<(), SinkError>;
}

impl OutputSink for Vec<AssembledEvent> {
    fn submit(&mut self, event: AssembledEvent) -> Result<(), SinkError> {
        self.push(event);
        Ok(())
    }
}

/// Event output trait
///
/// All dispatcher sink implementations must implement this trait.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one assembled event
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, event: &AssembledEvent) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
