//! # In-Memory Bus Connection
//!
//! A complete in-process bus used by tests and by builds without the `dbus`
//! feature. Uses `tokio::sync::broadcast` for the shared signal feed, so
//! fan-out and closure semantics match the real connection.
//!
//! Match rules are reference counted the way the bus daemon counts them:
//! adding the same rule twice needs two removals.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{BusHandle, FilterRule, MethodCall, RawEvent};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::connection::{BusConnection, EventFeed, RawProperty};
use crate::error::BusError;
use crate::DEFAULT_FEED_CAPACITY;

const ERR_SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
const ERR_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
const ERR_UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
const ERR_UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";

/// The bus daemon's own name.
pub const BUS_DAEMON_NAME: &str = "org.freedesktop.DBus";

/// A service registered on an [`InMemoryBusConnection`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryService {
    owner: String,
    objects: BTreeMap<String, String>,
    properties: HashMap<(String, String), RawProperty>,
    methods: HashMap<(String, String), Result<Vec<serde_json::Value>, String>>,
}

impl InMemoryService {
    /// A service owned by the given unique name.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Default::default()
        }
    }

    /// Export an object with its introspection document.
    #[must_use]
    pub fn with_object(mut self, path: impl Into<String>, xml: impl Into<String>) -> Self {
        self.objects.insert(path.into(), xml.into());
        self
    }

    #[must_use]
    pub fn with_property(
        mut self,
        interface: impl Into<String>,
        name: impl Into<String>,
        signature: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.properties.insert(
            (interface.into(), name.into()),
            RawProperty {
                signature: signature.into(),
                value,
            },
        );
        self
    }

    /// Canned reply for `interface.member`. `Err` is returned as a bus error name.
    #[must_use]
    pub fn with_method(
        mut self,
        interface: impl Into<String>,
        member: impl Into<String>,
        reply: Result<Vec<serde_json::Value>, String>,
    ) -> Self {
        self.methods.insert((interface.into(), member.into()), reply);
        self
    }
}

/// In-process bus connection.
pub struct InMemoryBusConnection {
    bus: BusHandle,

    /// Feed sender. Taken on close so every receiver observes closure.
    sender: Mutex<Option<broadcast::Sender<RawEvent>>>,

    /// Active match rules by rule string, with reference counts.
    matches: Mutex<HashMap<String, usize>>,

    /// Injected failures for `add_match` / `remove_match`.
    add_match_failure: Mutex<Option<String>>,
    remove_match_failure: Mutex<Option<String>>,

    /// Simulated daemon round trip for `remove_match`.
    remove_match_delay: Mutex<Option<Duration>>,

    services: RwLock<BTreeMap<String, InMemoryService>>,

    events_emitted: AtomicU64,
    closed: AtomicBool,
    capacity: usize,
}

impl InMemoryBusConnection {
    /// Create a connection with the default feed capacity.
    #[must_use]
    pub fn new(bus: BusHandle) -> Self {
        Self::with_capacity(bus, DEFAULT_FEED_CAPACITY)
    }

    /// Create a connection with the given feed capacity.
    #[must_use]
    pub fn with_capacity(bus: BusHandle, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            bus,
            sender: Mutex::new(Some(sender)),
            matches: Mutex::new(HashMap::new()),
            add_match_failure: Mutex::new(None),
            remove_match_failure: Mutex::new(None),
            remove_match_delay: Mutex::new(None),
            services: RwLock::new(BTreeMap::new()),
            events_emitted: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Publish a signal into the shared feed.
    ///
    /// Returns the number of feed receivers that got the event.
    pub fn emit(&self, event: RawEvent) -> usize {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);

        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            warn!(bus = %self.bus, "Event dropped (connection closed)");
            return 0;
        };

        let member = event.member.clone();
        match sender.send(event) {
            Ok(receivers) => {
                debug!(bus = %self.bus, member = %member, receivers, "Signal emitted");
                receivers
            }
            Err(_) => {
                debug!(bus = %self.bus, member = %member, "Signal dropped (no receivers)");
                0
            }
        }
    }

    /// Register a service under a well-known name.
    pub fn register_service(&self, name: impl Into<String>, service: InMemoryService) {
        self.services.write().insert(name.into(), service);
    }

    /// Make the next `add_match` calls fail with `reason` (`None` clears).
    pub fn fail_add_match(&self, reason: Option<&str>) {
        *self.add_match_failure.lock() = reason.map(str::to_string);
    }

    /// Make the next `remove_match` calls fail with `reason` (`None` clears).
    pub fn fail_remove_match(&self, reason: Option<&str>) {
        *self.remove_match_failure.lock() = reason.map(str::to_string);
    }

    /// Make every `remove_match` call take `delay` before answering.
    pub fn delay_remove_match(&self, delay: Option<Duration>) {
        *self.remove_match_delay.lock() = delay;
    }

    /// Reference count of one rule.
    #[must_use]
    pub fn match_count(&self, rule: &FilterRule) -> usize {
        self.matches
            .lock()
            .get(&rule.match_rule())
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all rule reference counts.
    #[must_use]
    pub fn active_match_count(&self) -> usize {
        self.matches.lock().values().sum()
    }

    /// Number of receivers attached to the feed.
    #[must_use]
    pub fn feed_receiver_count(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    fn service(&self, name: &str, target: &str) -> Result<InMemoryService, BusError> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::call_failed(target, ERR_SERVICE_UNKNOWN))
    }
}

#[async_trait]
impl BusConnection for InMemoryBusConnection {
    fn bus(&self) -> BusHandle {
        self.bus
    }

    async fn add_match(&self, rule: &FilterRule) -> Result<(), BusError> {
        self.ensure_open()?;
        if let Some(reason) = self.add_match_failure.lock().clone() {
            return Err(BusError::MatchRule(reason));
        }
        *self.matches.lock().entry(rule.match_rule()).or_insert(0) += 1;
        debug!(bus = %self.bus, rule = %rule.match_rule(), "Match rule added");
        Ok(())
    }

    async fn remove_match(&self, rule: &FilterRule) -> Result<(), BusError> {
        self.ensure_open()?;
        let delay = *self.remove_match_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.remove_match_failure.lock().clone() {
            return Err(BusError::MatchRule(reason));
        }
        let key = rule.match_rule();
        let mut matches = self.matches.lock();
        let Some(count) = matches.get_mut(&key) else {
            return Err(BusError::MatchRule(format!("no such rule: {key}")));
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            matches.remove(&key);
        }
        debug!(bus = %self.bus, rule = %key, "Match rule removed");
        Ok(())
    }

    fn event_feed(&self) -> Result<EventFeed, BusError> {
        self.sender
            .lock()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(BusError::Closed)
    }

    async fn list_names(&self) -> Result<Vec<String>, BusError> {
        self.ensure_open()?;
        let services = self.services.read();
        let mut names = vec![BUS_DAEMON_NAME.to_string()];
        names.extend(services.keys().cloned());
        Ok(names)
    }

    async fn name_owner(&self, name: &str) -> Result<String, BusError> {
        self.ensure_open()?;
        if name == BUS_DAEMON_NAME {
            return Ok(BUS_DAEMON_NAME.to_string());
        }
        let target = format!("{BUS_DAEMON_NAME}.GetNameOwner({name})");
        Ok(self.service(name, &target)?.owner)
    }

    async fn introspect(&self, service: &str, path: &str) -> Result<String, BusError> {
        self.ensure_open()?;
        let target = format!("{service} {path} Introspect");
        self.service(service, &target)?
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| BusError::call_failed(target, ERR_UNKNOWN_OBJECT))
    }

    async fn call_method(&self, call: &MethodCall) -> Result<Vec<serde_json::Value>, BusError> {
        self.ensure_open()?;
        let target = call.target();
        let service = self.service(&call.destination, &target)?;
        match service
            .methods
            .get(&(call.interface.clone(), call.member.clone()))
        {
            Some(Ok(values)) => Ok(values.clone()),
            Some(Err(error_name)) => Err(BusError::call_failed(target, error_name)),
            None => Err(BusError::call_failed(target, ERR_UNKNOWN_METHOD)),
        }
    }

    async fn get_property(
        &self,
        service: &str,
        _path: &str,
        interface: &str,
        property: &str,
    ) -> Result<RawProperty, BusError> {
        self.ensure_open()?;
        let target = format!("{service} {interface}.{property}");
        self.service(service, &target)?
            .properties
            .get(&(interface.to_string(), property.to_string()))
            .cloned()
            .ok_or_else(|| BusError::call_failed(target, ERR_UNKNOWN_PROPERTY))
    }

    async fn set_property(
        &self,
        service: &str,
        _path: &str,
        interface: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let target = format!("{service} {interface}.{property}");
        let mut services = self.services.write();
        let entry = services
            .get_mut(service)
            .ok_or_else(|| BusError::call_failed(&target, ERR_SERVICE_UNKNOWN))?;
        let slot = entry
            .properties
            .get_mut(&(interface.to_string(), property.to_string()))
            .ok_or_else(|| BusError::call_failed(&target, ERR_UNKNOWN_PROPERTY))?;
        slot.value = value.clone();
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the last sender closes every receiver.
        self.sender.lock().take();
        self.matches.lock().clear();
        debug!(bus = %self.bus, "In-memory connection closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
