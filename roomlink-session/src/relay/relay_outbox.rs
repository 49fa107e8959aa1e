use crate::error::RelayError;
use crate::queue::{Enqueued, OverflowPolicy, Queue};
use crate::relay::RelaySink;
use roomlink_core::ClientEnvelope;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Relay-bound sends. While the relay is closed envelopes wait here and are
/// flushed, in order, on the next open.
pub struct RelayOutbox {
    sink: Arc<dyn RelaySink>,
    queue: Queue<String>,
    open: bool,
}

impl RelayOutbox {
    pub fn new(sink: Arc<dyn RelaySink>, capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            sink,
            queue: Queue::new(capacity, policy),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub async fn send(&mut self, envelope: &ClientEnvelope) -> Result<(), RelayError> {
        let text = envelope.to_json()?;
        if !self.open {
            debug!(kind = envelope.kind(), "relay closed, queueing envelope");
            return self.enqueue(text);
        }

        match self.sink.send(text.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "relay send failed, queueing envelope");
                self.open = false;
                self.enqueue(text)
            }
        }
    }

    /// Marks the relay open and flushes everything queued so far.
    pub async fn on_opened(&mut self) {
        self.open = true;
        let batch = self.queue.take_batch();
        if batch.is_empty() {
            return;
        }
        info!(count = batch.len(), "flushing queued relay envelopes");

        let mut pending = batch.into_iter();
        while let Some(text) = pending.next() {
            if let Err(e) = self.sink.send(text.clone()).await {
                warn!(error = %e, "relay flush interrupted");
                self.open = false;
                let mut rest = vec![text];
                rest.extend(pending);
                self.queue.requeue_front(rest);
                return;
            }
        }
    }

    pub fn on_closed(&mut self) {
        self.open = false;
    }

    fn enqueue(&mut self, text: String) -> Result<(), RelayError> {
        match self.queue.enqueue(text)? {
            Enqueued::Queued => {}
            Enqueued::Evicted(_) => warn!("relay outbox full, dropped oldest envelope"),
            Enqueued::Discarded(_) => warn!("relay outbox full, dropped envelope"),
        }
        Ok(())
    }
}
