//! LogSink - logs event summary via tracing

use contracts::{AssembledEvent, ContractError, EventBody, EventSink};
use tracing::{debug, info, instrument};

/// Sink that logs event summaries for debugging
pub struct LogSink {
    name: String,
    /// Log every N-th physics event at info; the rest at debug
    sample_every: u64,
    physics_seen: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sample_every: 1,
            physics_seen: 0,
        }
    }

    pub fn with_sample_every(mut self, every: u64) -> Self {
        self.sample_every = every.max(1);
        self
    }

    fn log_event_summary(&mut self, event: &AssembledEvent) {
        match &event.body {
            EventBody::Physics {
                reference_timestamp,
                records,
            } => {
                self.physics_seen += 1;
                if self.physics_seen % self.sample_every == 0 {
                    info!(
                        sink = %self.name,
                        event_id = event.event_id,
                        reference_timestamp = format_args!("{reference_timestamp:#010x}"),
                        contributors = event.contributors.len(),
                        bytes = records.len(),
                        "physics event"
                    );
                } else {
                    debug!(sink = %self.name, event_id = event.event_id, "physics event");
                }
            }
            EventBody::StateTransition {
                transition,
                run_number,
                title,
                ..
            } => {
                info!(
                    sink = %self.name,
                    event_id = event.event_id,
                    transition = ?transition,
                    run_number,
                    title = %title,
                    "state transition"
                );
            }
            EventBody::Scaler(scaler) => {
                info!(
                    sink = %self.name,
                    event_id = event.event_id,
                    interval_start = scaler.interval_start,
                    interval_end = scaler.interval_end,
                    channels = scaler.values.len(),
                    "scaler readout"
                );
            }
            EventBody::StringList(list) => {
                info!(
                    sink = %self.name,
                    event_id = event.event_id,
                    kind = ?list.kind,
                    strings = list.strings.len(),
                    "string list"
                );
            }
        }
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, event),
        fields(sink = %self.name, event_id = event.event_id)
    )]
    async fn write(&mut self, event: &AssembledEvent) -> Result<(), ContractError> {
        self.log_event_summary(event);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, physics = self.physics_seen, "LogSink closed");
        Ok(())
    }
}
