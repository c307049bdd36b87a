//! Outbound event channel with cooperative cancellation.
//!
//! The producer side of the stream: the collector (and the surrounding
//! pipeline) pushes [`StreamEvent`]s into a bounded channel whose receiver
//! feeds the SSE response. When the client disconnects the receiver is
//! dropped; the next send observes the closed channel, latches the cancel
//! flag, and every later suspension point sees the run as cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use blogsmith_common::StreamEvent;

#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancelled: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Push one event. Returns false once the consumer is gone; the failure
    /// latches the cancel flag so callers that ignore the return value still
    /// stop at their next cancellation check.
    pub async fn send(&self, event: StreamEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(_) => {
                debug!("Event channel closed, cancelling run");
                self.cancelled.store(true, Ordering::Relaxed);
                false
            }
        }
    }

    /// True once the consumer disconnected or cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.tx.is_closed()
    }

    /// Request cancellation without a failed send (e.g. from a watchdog).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_while_receiver_lives() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(tx);

        assert!(sink.send(StreamEvent::processing("go")).await);
        assert!(!sink.is_cancelled());
        assert_eq!(rx.recv().await.unwrap().status(), "processing");
    }

    #[tokio::test]
    async fn dropped_receiver_latches_cancellation() {
        let (tx, rx) = mpsc::channel(4);
        let sink = EventSink::new(tx);
        drop(rx);

        assert!(!sink.send(StreamEvent::processing("go")).await);
        assert!(sink.is_cancelled());
        // Later sends short-circuit without touching the channel.
        assert!(!sink.send(StreamEvent::processing_complete(0)).await);
    }

    #[tokio::test]
    async fn explicit_cancel_stops_sends() {
        let (tx, _rx) = mpsc::channel(4);
        let sink = EventSink::new(tx);
        sink.cancel();

        assert!(sink.is_cancelled());
        assert!(!sink.send(StreamEvent::processing("go")).await);
    }
}
