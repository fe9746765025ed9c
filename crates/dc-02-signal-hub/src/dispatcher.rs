//! # Event Dispatcher
//!
//! One task per Active subscription. Reads its own receiver on the bus's
//! shared signal feed, keeps the events its filter matches and pushes them
//! into the subscription's delivery queue.
//!
//! ## Loop
//!
//! ```text
//! loop {
//!     select (biased) {
//!         stop signalled   => exit
//!         feed event       => match filter, try_push, count drop on Full
//!         feed lagged(n)   => count, continue
//!         feed closed      => mark Closed, exit
//!     }
//! }
//! exit: drop the queue writer (closes the queue exactly once)
//! ```
//!
//! Nothing inside the loop can end it except the stop signal or feed closure.

use std::sync::Arc;

use shared_bus::EventFeed;
use shared_types::RawEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::SubscriptionState;
use crate::metrics::SignalMetrics;
use crate::queue::{PushOutcome, QueueWriter};

/// Why a dispatcher loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    Stopped,
    FeedClosed,
}

pub struct EventDispatcher {
    state: Arc<SubscriptionState>,
    feed: EventFeed,
    writer: QueueWriter,
    stop: watch::Receiver<bool>,
    metrics: Arc<dyn SignalMetrics>,
}

impl EventDispatcher {
    pub fn new(
        state: Arc<SubscriptionState>,
        feed: EventFeed,
        writer: QueueWriter,
        stop: watch::Receiver<bool>,
        metrics: Arc<dyn SignalMetrics>,
    ) -> Self {
        Self {
            state,
            feed,
            writer,
            stop,
            metrics,
        }
    }

    /// Run the loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<DispatchExit> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> DispatchExit {
        debug!(subscription_id = %self.state.id(), "Dispatcher started");

        let exit = loop {
            if self.stop_requested() {
                break DispatchExit::Stopped;
            }

            tokio::select! {
                biased;

                changed = self.stop.changed() => {
                    // A dropped stop sender also means stop.
                    if changed.is_err() || *self.stop.borrow() {
                        break DispatchExit::Stopped;
                    }
                }

                received = self.feed.recv() => match received {
                    Ok(event) => self.dispatch(event),
                    Err(RecvError::Lagged(skipped)) => {
                        self.state.record_lagged(skipped);
                        self.metrics.feed_lagged(skipped);
                        warn!(
                            subscription_id = %self.state.id(),
                            skipped,
                            "Dispatcher lagged behind the signal feed"
                        );
                    }
                    Err(RecvError::Closed) => {
                        if self.state.mark_closed() {
                            self.metrics.subscription_closed();
                        }
                        info!(subscription_id = %self.state.id(), "Signal feed closed");
                        break DispatchExit::FeedClosed;
                    }
                },
            }
        };

        debug!(
            subscription_id = %self.state.id(),
            delivered = self.state.delivered(),
            dropped = self.state.dropped(),
            ?exit,
            "Dispatcher finished"
        );
        exit
        // `self.writer` drops here and closes the queue.
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow() || !self.state.is_active()
    }

    fn dispatch(&self, event: RawEvent) {
        if !self.state.filter().matches(&event) {
            return;
        }
        // Re-checked per push so nothing is written after Closed.
        if self.stop_requested() {
            return;
        }

        match self.writer.try_push(event) {
            PushOutcome::Delivered => {
                self.state.record_delivered();
                self.metrics.event_delivered();
            }
            PushOutcome::Full => {
                self.state.record_dropped();
                self.metrics.event_dropped();
                warn!(
                    subscription_id = %self.state.id(),
                    dropped = self.state.dropped(),
                    "Delivery queue full, event dropped"
                );
            }
            PushOutcome::Closed => {
                debug!(subscription_id = %self.state.id(), "Delivery queue reader gone");
            }
        }
    }
}
