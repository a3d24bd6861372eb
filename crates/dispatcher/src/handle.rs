//! SinkHandle - one sink behind a bounded queue and its worker task.
//!
//! 投递策略按事件类型区分：
//! - physics / scaler / string list：队列满时丢弃并计数
//! - run 状态转换：等待队列空位，绝不丢弃 (文件按 run 切分依赖它们)
//!
//! Worker 在写完 EndRun 后立即 flush，保证一个 run 的数据在下一个 run 开始前落盘。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{AssembledEvent, EventBody, EventSink, TransitionKind};

use crate::metrics::SinkMetrics;

/// Result of handing one event to a sink queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full; the event was not delivered to this sink
    Dropped,
    /// Worker is gone
    Closed,
}

pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<AssembledEvent>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    pub fn spawn<S: EventSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            sink,
            rx,
            metrics: Arc::clone(&metrics),
            name: name.clone(),
        };
        let worker = tokio::spawn(worker.run());

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue one event for this sink.
    ///
    /// Run transitions wait for queue space; everything else is dropped
    /// when the queue is full.
    pub async fn deliver(&self, event: AssembledEvent) -> Delivery {
        if matches!(event.body, EventBody::StateTransition { .. }) {
            let event_id = event.event_id;
            return match self.tx.send(event).await {
                Ok(()) => {
                    self.note_queue_len();
                    Delivery::Queued
                }
                Err(_) => {
                    error!(sink = %self.name, event_id, "sink worker gone, run transition lost");
                    Delivery::Closed
                }
            };
        }

        match self.tx.try_send(event) {
            Ok(()) => {
                self.note_queue_len();
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    event_id = event.event_id,
                    type_code = event.type_code,
                    "sink queue full, event dropped"
                );
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                error!(sink = %self.name, event_id = event.event_id, "sink worker gone");
                Delivery::Closed
            }
        }
    }

    fn note_queue_len(&self) {
        self.metrics
            .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
    }

    /// Close the queue and wait until the worker has drained, flushed and closed the sink.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
    }
}

struct SinkWorker<S> {
    sink: S,
    rx: mpsc::Receiver<AssembledEvent>,
    metrics: Arc<SinkMetrics>,
    name: String,
}

impl<S: EventSink> SinkWorker<S> {
    #[instrument(name = "sink_worker", skip(self), fields(sink = %self.name))]
    async fn run(mut self) {
        debug!("sink worker started");

        while let Some(event) = self.rx.recv().await {
            self.metrics.set_queue_len(self.rx.len());
            self.write(&event).await;
        }

        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "flush failed at shutdown");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "close failed at shutdown");
        }
        debug!(
            written = self.metrics.write_count(),
            runs_closed = self.metrics.runs_closed(),
            "sink worker stopped"
        );
    }

    async fn write(&mut self, event: &AssembledEvent) {
        if let Err(e) = self.sink.write(event).await {
            self.metrics.inc_failure_count();
            error!(
                event_id = event.event_id,
                type_code = event.type_code,
                error = %e,
                "write failed"
            );
            return;
        }
        self.metrics.record_write(event);

        if let EventBody::StateTransition {
            transition: TransitionKind::End,
            run_number,
            ..
        } = &event.body
        {
            match self.sink.flush().await {
                Ok(()) => {
                    self.metrics.inc_runs_closed();
                    info!(run_number, "run closed on sink");
                }
                Err(e) => {
                    self.metrics.inc_failure_count();
                    error!(run_number, error = %e, "flush at end of run failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{ContractError, NodeId, TYPE_BEGIN_RUN, TYPE_END_RUN, TYPE_PHYSICS};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// Records written type codes and flush calls
    #[derive(Default)]
    struct Journal {
        types: Mutex<Vec<u16>>,
        flushes: AtomicU64,
    }

    struct RecordingSink {
        journal: Arc<Journal>,
        delay: Duration,
        fail_physics: bool,
    }

    impl RecordingSink {
        fn new(journal: &Arc<Journal>) -> Self {
            Self {
                journal: Arc::clone(journal),
                delay: Duration::ZERO,
                fail_physics: false,
            }
        }
    }

    impl EventSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write(&mut self, event: &AssembledEvent) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail_physics && event.is_physics() {
                return Err(ContractError::sink_write("recording", "disk full"));
            }
            self.journal.types.lock().unwrap().push(event.type_code);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            self.journal.flushes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn physics(event_id: u64) -> AssembledEvent {
        AssembledEvent {
            event_id,
            type_code: TYPE_PHYSICS,
            contributors: vec![NodeId::new(1)],
            body: EventBody::Physics {
                reference_timestamp: event_id as u32,
                records: Bytes::new(),
            },
        }
    }

    fn transition(event_id: u64, transition: TransitionKind) -> AssembledEvent {
        let type_code = match transition {
            TransitionKind::Begin => TYPE_BEGIN_RUN,
            _ => TYPE_END_RUN,
        };
        AssembledEvent {
            event_id,
            type_code,
            contributors: vec![NodeId::new(1)],
            body: EventBody::StateTransition {
                transition,
                run_number: 3,
                title: "cosmics".into(),
                elapsed_time: 0,
                absolute_time: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_end_of_run_flushes_sink() {
        let journal = Arc::new(Journal::default());
        let handle = SinkHandle::spawn(RecordingSink::new(&journal), 8);

        assert_eq!(handle.deliver(transition(0, TransitionKind::Begin)).await, Delivery::Queued);
        assert_eq!(handle.deliver(physics(1)).await, Delivery::Queued);
        assert_eq!(handle.deliver(transition(2, TransitionKind::End)).await, Delivery::Queued);

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;

        assert_eq!(
            *journal.types.lock().unwrap(),
            vec![TYPE_BEGIN_RUN, TYPE_PHYSICS, TYPE_END_RUN]
        );
        // one flush at end of run, one at shutdown
        assert_eq!(journal.flushes.load(Ordering::Relaxed), 2);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_closed, 1);
        assert_eq!(snapshot.transitions_written, 2);
        assert_eq!(snapshot.last_event_id, Some(2));
    }

    #[tokio::test]
    async fn test_full_queue_drops_physics_but_keeps_transitions() {
        let journal = Arc::new(Journal::default());
        let sink = RecordingSink {
            delay: Duration::from_millis(20),
            ..RecordingSink::new(&journal)
        };
        let handle = SinkHandle::spawn(sink, 1);

        let mut dropped = 0;
        for id in 0..6 {
            if handle.deliver(physics(id)).await == Delivery::Dropped {
                dropped += 1;
            }
        }
        assert!(dropped > 0);
        assert_eq!(
            handle.deliver(transition(6, TransitionKind::End)).await,
            Delivery::Queued
        );

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;

        assert_eq!(metrics.dropped_count(), dropped);
        assert_eq!(journal.types.lock().unwrap().last(), Some(&TYPE_END_RUN));
        assert_eq!(metrics.runs_closed(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_worker() {
        let journal = Arc::new(Journal::default());
        let sink = RecordingSink {
            fail_physics: true,
            ..RecordingSink::new(&journal)
        };
        let handle = SinkHandle::spawn(sink, 8);

        handle.deliver(physics(0)).await;
        handle.deliver(physics(1)).await;
        handle.deliver(transition(2, TransitionKind::Begin)).await;

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;

        assert_eq!(metrics.failure_count(), 2);
        assert_eq!(metrics.write_count(), 1);
        assert_eq!(*journal.types.lock().unwrap(), vec![TYPE_BEGIN_RUN]);
    }
}
