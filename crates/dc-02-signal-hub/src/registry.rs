//! # Subscription Registry
//!
//! Authoritative map of subscription id to live subscription.
//!
//! ## Lock discipline
//!
//! One `parking_lot::Mutex` guards the map and the shutdown flag. It is held
//! only for map operations, never across a bus call, a channel operation or
//! an `.await`. Match rules are added before an entry becomes visible and
//! removed after it has left the map, so no half-registered subscription is
//! ever observable.
//!
//! ## Teardown
//!
//! Whoever removes an entry from the map tears it down, so each entry is
//! closed by exactly one caller (`unsubscribe` or `close_all`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use shared_bus::BusConnectionPool;
use shared_types::{BusHandle, FilterRule, RawEvent, Subscription, SubscriptionId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatcher::{DispatchExit, EventDispatcher};
use crate::domain::{SignalError, SignalHubConfig, SubscriptionState};
use crate::metrics::{NoOpMetrics, SignalMetrics};
use crate::ports::SignalSubscriptionApi;
use crate::queue::{delivery_queue, QueueReader};

/// Registry-side handle of one subscription.
struct SubscriptionEntry {
    state: Arc<SubscriptionState>,
    stop: watch::Sender<bool>,
    queue: QueueReader,
    task: Mutex<Option<JoinHandle<DispatchExit>>>,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<SubscriptionId, Arc<SubscriptionEntry>>,
    closed: bool,
}

impl RegistryInner {
    fn active_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state.is_active())
            .count()
    }

    fn active(&self, id: &str) -> Option<&Arc<SubscriptionEntry>> {
        self.entries.get(id).filter(|entry| entry.state.is_active())
    }
}

/// Outcome of the locked insertion step.
enum Insertion {
    Inserted(Arc<SubscriptionEntry>, EventDispatcher),
    /// A concurrent identical subscribe got there first.
    Existing(Subscription),
    ShuttingDown,
    LimitExceeded,
}

/// Signal subscription registry. Implements [`SignalSubscriptionApi`].
pub struct SubscriptionRegistry {
    pool: Arc<BusConnectionPool>,
    config: SignalHubConfig,
    metrics: Arc<dyn SignalMetrics>,
    inner: Mutex<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new(pool: Arc<BusConnectionPool>, config: SignalHubConfig) -> Self {
        Self::with_metrics(pool, config, Arc::new(NoOpMetrics))
    }

    pub fn with_metrics(
        pool: Arc<BusConnectionPool>,
        config: SignalHubConfig,
        metrics: Arc<dyn SignalMetrics>,
    ) -> Self {
        Self {
            pool,
            config,
            metrics,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub fn config(&self) -> &SignalHubConfig {
        &self.config
    }

    /// Register a filter and start delivering matching events.
    ///
    /// Identical parameters yield the existing Active subscription.
    pub async fn subscribe(
        &self,
        bus: BusHandle,
        sender: &str,
        interface: &str,
        member: &str,
    ) -> Result<Subscription, SignalError> {
        let filter = FilterRule::new(bus, sender, interface, member)?;
        let id = filter.subscription_id();

        {
            let inner = self.inner.lock();
            if inner.closed {
                return Err(SignalError::ShuttingDown);
            }
            if let Some(existing) = inner.active(&id) {
                debug!(subscription_id = %id, "Reusing active subscription");
                return Ok(existing.state.snapshot());
            }
            if inner.active_count() >= self.config.max_subscriptions {
                return Err(SignalError::LimitExceeded(self.config.max_subscriptions));
            }
        }

        let connection = self
            .pool
            .connection(bus)
            .map_err(|e| SignalError::from_connection(bus, &id, e))?;
        // Receiver first: nothing emitted after AddMatch can be missed.
        let feed = connection
            .event_feed()
            .map_err(|e| SignalError::from_connection(bus, &id, e))?;

        if let Err(e) = connection.add_match(&filter).await {
            self.metrics.match_error("add_match");
            warn!(subscription_id = %id, error = %e, "Failed to register match rule");
            return Err(SignalError::FilterRegistration {
                id,
                reason: e.to_string(),
            });
        }

        let state = Arc::new(SubscriptionState::new(filter.clone()));
        let (stop, stop_rx) = watch::channel(false);
        let (writer, queue) = delivery_queue(self.config.queue_capacity);
        let dispatcher = EventDispatcher::new(
            state.clone(),
            feed,
            writer,
            stop_rx,
            self.metrics.clone(),
        );
        let entry = Arc::new(SubscriptionEntry {
            state,
            stop,
            queue,
            task: Mutex::new(None),
        });

        match self.insert(&id, entry, dispatcher) {
            Insertion::Inserted(entry, dispatcher) => {
                let task = dispatcher.spawn();
                *entry.task.lock() = Some(task);
                info!(subscription_id = %id, bus = %bus, "Subscription created");
                Ok(entry.state.snapshot())
            }
            Insertion::Existing(existing) => {
                self.remove_match(&filter, &id).await;
                debug!(subscription_id = %id, "Lost concurrent subscribe; reusing winner");
                Ok(existing)
            }
            Insertion::ShuttingDown => {
                self.remove_match(&filter, &id).await;
                Err(SignalError::ShuttingDown)
            }
            Insertion::LimitExceeded => {
                self.remove_match(&filter, &id).await;
                Err(SignalError::LimitExceeded(self.config.max_subscriptions))
            }
        }
    }

    fn insert(
        &self,
        id: &str,
        entry: Arc<SubscriptionEntry>,
        dispatcher: EventDispatcher,
    ) -> Insertion {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Insertion::ShuttingDown;
        }
        if let Some(existing) = inner.active(id) {
            return Insertion::Existing(existing.state.snapshot());
        }
        if inner.active_count() >= self.config.max_subscriptions {
            return Insertion::LimitExceeded;
        }
        // Replaces a stale entry whose feed already closed.
        inner.entries.insert(id.to_string(), entry.clone());
        self.metrics.subscription_opened();
        Insertion::Inserted(entry, dispatcher)
    }

    /// Best-effort `RemoveMatch`; failures are logged and counted.
    async fn remove_match(&self, filter: &FilterRule, id: &str) {
        let result = match self.pool.connection(filter.bus) {
            Ok(connection) => connection.remove_match(filter).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.metrics.match_error("remove_match");
            warn!(subscription_id = %id, error = %e, "Failed to remove match rule");
        }
    }

    /// Stop one subscription and release its queue.
    ///
    /// Returns the closed snapshot. Unknown ids, and entries already closed by
    /// feed teardown (which are reaped here), yield `NotFound`.
    pub async fn unsubscribe(&self, id: &str) -> Result<Subscription, SignalError> {
        let entry = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.entries.remove(id) else {
                return Err(SignalError::NotFound(id.to_string()));
            };
            if !entry.state.is_active() {
                debug!(subscription_id = %id, "Reaped subscription closed by feed teardown");
                return Err(SignalError::NotFound(id.to_string()));
            }
            entry
        };

        self.teardown(&entry, true).await;
        info!(subscription_id = %id, "Subscription closed");
        Ok(entry.state.snapshot())
    }

    /// Close every subscription and refuse new ones. Idempotent.
    ///
    /// Every drained subscription is Closed and its dispatcher stopped before
    /// the first bus round trip; match rules are then released concurrently.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<SubscriptionEntry>> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.entries.drain().map(|(_, entry)| entry).collect()
        };

        if drained.is_empty() {
            debug!("close_all: nothing to close");
            return;
        }

        let mut release = Vec::with_capacity(drained.len());
        for entry in &drained {
            if self.close_entry(entry) {
                release.push(entry);
            }
        }

        for entry in &drained {
            Self::join_dispatcher(entry).await;
        }

        if self.config.remove_match_on_close_all {
            join_all(
                release
                    .iter()
                    .map(|entry| self.remove_match(entry.state.filter(), entry.state.id())),
            )
            .await;
        }
        info!(count = drained.len(), "All subscriptions closed");
    }

    /// Caller must have removed `entry` from the map.
    async fn teardown(&self, entry: &SubscriptionEntry, remove_match: bool) {
        let was_active = self.close_entry(entry);
        Self::join_dispatcher(entry).await;

        // An entry closed by feed teardown has no live bus to talk to.
        if remove_match && was_active {
            self.remove_match(entry.state.filter(), entry.state.id()).await;
        }
    }

    /// Mark Closed and signal the dispatcher. No await: nothing is pushed
    /// after this returns. Returns whether the entry was still Active.
    fn close_entry(&self, entry: &SubscriptionEntry) -> bool {
        let was_active = entry.state.mark_closed();
        if was_active {
            self.metrics.subscription_closed();
        }
        entry.stop.send_replace(true);
        was_active
    }

    /// Wait for the dispatcher to exit, which drops the queue writer.
    async fn join_dispatcher(entry: &SubscriptionEntry) {
        let task = entry.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(subscription_id = %entry.state.id(), error = %e, "Dispatcher task failed");
            }
        }
    }

    /// Snapshot of one subscription (Active, or Closed with unread events).
    pub fn get(&self, id: &str) -> Option<Subscription> {
        self.inner
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.state.snapshot())
    }

    /// Snapshots of every tracked subscription, ordered by id.
    pub fn list(&self) -> Vec<Subscription> {
        let mut subs: Vec<_> = self
            .inner
            .lock()
            .entries
            .values()
            .map(|entry| entry.state.snapshot())
            .collect();
        subs.sort_by(|a, b| a.id.cmp(&b.id));
        subs
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().active_count()
    }

    /// Matching events discarded for `id` because its queue was full.
    pub fn dropped_count(&self, id: &str) -> Result<u64, SignalError> {
        self.entry(id).map(|entry| entry.state.dropped())
    }

    /// Take up to `max` queued events without waiting.
    ///
    /// Empty while a `next_event` wait on the same id is pending; that wait
    /// receives the next event instead.
    pub fn poll(&self, id: &str, max: usize) -> Result<Vec<RawEvent>, SignalError> {
        Ok(self.entry(id)?.queue.drain(max))
    }

    /// Wait for the next event, up to `wait` (or the configured default).
    ///
    /// `Ok(None)` on timeout or when the queue is closed and empty.
    pub async fn next_event(
        &self,
        id: &str,
        wait: Option<Duration>,
    ) -> Result<Option<RawEvent>, SignalError> {
        let entry = self.entry(id)?;
        let wait = wait.unwrap_or(self.config.default_wait);
        Ok(entry.queue.next(wait).await)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn entry(&self, id: &str) -> Result<Arc<SubscriptionEntry>, SignalError> {
        self.inner
            .lock()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| SignalError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl SignalSubscriptionApi for SubscriptionRegistry {
    async fn subscribe(
        &self,
        bus: BusHandle,
        sender: &str,
        interface: &str,
        member: &str,
    ) -> Result<Subscription, SignalError> {
        SubscriptionRegistry::subscribe(self, bus, sender, interface, member).await
    }

    async fn unsubscribe(&self, id: &str) -> Result<Subscription, SignalError> {
        SubscriptionRegistry::unsubscribe(self, id).await
    }

    fn get(&self, id: &str) -> Option<Subscription> {
        SubscriptionRegistry::get(self, id)
    }

    fn list(&self) -> Vec<Subscription> {
        SubscriptionRegistry::list(self)
    }

    fn poll(&self, id: &str, max: usize) -> Result<Vec<RawEvent>, SignalError> {
        SubscriptionRegistry::poll(self, id, max)
    }

    async fn next_event(
        &self,
        id: &str,
        wait: Option<Duration>,
    ) -> Result<Option<RawEvent>, SignalError> {
        SubscriptionRegistry::next_event(self, id, wait).await
    }
}
