//! # Delivery Queue
//!
//! Bounded FIFO between one dispatcher and its consumer.
//!
//! The dispatcher owns the only [`QueueWriter`]; dropping it closes the queue
//! for writing. The registry owns the [`QueueReader`]. Events already queued
//! stay readable after the writer is gone.

use std::time::Duration;

use shared_types::RawEvent;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Mutex;

/// Result of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// Queue at capacity; the event was discarded.
    Full,
    /// Reader is gone.
    Closed,
}

/// Create a queue with room for `capacity` events.
pub fn delivery_queue(capacity: usize) -> (QueueWriter, QueueReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueWriter { tx },
        QueueReader {
            rx: Mutex::new(rx),
            capacity,
        },
    )
}

/// Producer half. Not `Clone`: there is exactly one writer per queue.
#[derive(Debug)]
pub struct QueueWriter {
    tx: mpsc::Sender<RawEvent>,
}

impl QueueWriter {
    /// Push without waiting. A full queue discards `event`.
    pub fn try_push(&self, event: RawEvent) -> PushOutcome {
        match self.tx.try_send(event) {
            Ok(()) => PushOutcome::Delivered,
            Err(TrySendError::Full(_)) => PushOutcome::Full,
            Err(TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct QueueReader {
    rx: Mutex<mpsc::Receiver<RawEvent>>,
    capacity: usize,
}

impl QueueReader {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take up to `max` queued events without waiting.
    ///
    /// Returns nothing while a [`next`](Self::next) wait holds the queue. That
    /// waiter takes the first event pushed meanwhile, so nothing is skipped.
    pub fn drain(&self, max: usize) -> Vec<RawEvent> {
        let Ok(mut rx) = self.rx.try_lock() else {
            return Vec::new();
        };
        let mut events = Vec::with_capacity(max.min(self.capacity));
        while events.len() < max {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Wait up to `wait` for the next event.
    ///
    /// `None` on timeout, or once the writer is gone and the queue is empty.
    pub async fn next(&self, wait: Duration) -> Option<RawEvent> {
        let deadline = tokio::time::Instant::now() + wait;
        let mut rx = tokio::time::timeout_at(deadline, self.rx.lock()).await.ok()?;
        tokio::time::timeout_at(deadline, rx.recv()).await.ok().flatten()
    }
}
