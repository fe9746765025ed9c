//! # zbus Connection
//!
//! [`BusConnection`] over a real system or session bus.
//!
//! One background pump reads every incoming message and republishes the
//! signals into the shared broadcast feed. Match rules are added and removed
//! through the bus daemon so only subscribed signals reach the pump.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use shared_types::{BusHandle, FilterRule, MethodCall, RawEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zbus::message::Type as MessageType;
use zbus::zvariant::{OwnedValue, Structure, StructureBuilder, Value};
use zbus::{Connection, MessageStream};

use crate::connection::{BusConnection, EventFeed, RawProperty};
use crate::error::BusError;

const DBUS_NAME: &str = "org.freedesktop.DBus";
const DBUS_PATH: &str = "/org/freedesktop/DBus";
const DBUS_INTERFACE: &str = "org.freedesktop.DBus";
const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// A live zbus connection plus its signal pump.
pub struct ZbusConnection {
    bus: BusHandle,
    conn: Connection,
    sender: Mutex<Option<broadcast::Sender<RawEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    call_timeout: Duration,
    closed: AtomicBool,
}

impl ZbusConnection {
    /// Connect to `bus` and start the signal pump.
    pub async fn connect(
        bus: BusHandle,
        call_timeout: Duration,
        feed_capacity: usize,
    ) -> Result<Self, BusError> {
        let conn = match bus {
            BusHandle::System => Connection::system().await,
            BusHandle::Session => Connection::session().await,
        }
        .map_err(|e| {
            warn!(bus = %bus, error = %e, "Failed to connect to bus");
            BusError::ConnectionUnavailable(bus)
        })?;

        let (sender, _) = broadcast::channel(feed_capacity.max(1));
        let pump = tokio::spawn(pump_signals(bus, MessageStream::from(&conn), sender.clone()));

        Ok(Self {
            bus,
            conn,
            sender: Mutex::new(Some(sender)),
            pump: Mutex::new(Some(pump)),
            call_timeout,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    /// Await a bus call under the configured timeout.
    async fn timed<T>(
        &self,
        target: &str,
        call: impl Future<Output = zbus::Result<T>> + Send,
    ) -> Result<T, BusError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BusError::call_failed(target, e)),
            Err(_) => Err(BusError::Timeout(target.to_string())),
        }
    }

    async fn daemon_match_call(&self, member: &str, rule: &FilterRule) -> Result<(), BusError> {
        self.ensure_open()?;
        let rule_string = rule.match_rule();
        let body = rule_string.as_str();
        let target = format!("{DBUS_INTERFACE}.{member}");
        let call = self.conn.call_method(
            Some(DBUS_NAME),
            DBUS_PATH,
            Some(DBUS_INTERFACE),
            member,
            &body,
        );
        self.timed(&target, call)
            .await
            .map_err(|e| BusError::MatchRule(e.to_string()))?;
        debug!(bus = %self.bus, rule = %rule_string, member, "Match rule call completed");
        Ok(())
    }
}

/// Forward every signal on the connection into the feed until the stream ends.
async fn pump_signals(
    bus: BusHandle,
    mut stream: MessageStream,
    sender: broadcast::Sender<RawEvent>,
) {
    while let Some(next) = stream.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(e) => {
                warn!(bus = %bus, error = %e, "Dropping unreadable message");
                continue;
            }
        };
        if msg.message_type() != MessageType::Signal {
            continue;
        }

        let header = msg.header();
        let event = RawEvent::new(
            header.sender().map(|s| s.to_string()).unwrap_or_default(),
            header.interface().map(|i| i.to_string()).unwrap_or_default(),
            header.member().map(|m| m.to_string()).unwrap_or_default(),
            header.path().map(|p| p.to_string()).unwrap_or_default(),
            body_to_json(msg.body().deserialize::<Structure<'_>>().ok()),
        );

        // No receivers is normal between subscriptions.
        let _ = sender.send(event);
    }
    debug!(bus = %bus, "Signal pump finished");
}

fn body_to_json(body: Option<Structure<'_>>) -> serde_json::Value {
    match body {
        Some(structure) => {
            serde_json::Value::Array(structure.fields().iter().map(value_to_json).collect())
        }
        None => serde_json::Value::Array(Vec::new()),
    }
}

/// Scalars map to JSON scalars; containers fall back to their debug form.
fn value_to_json(value: &Value<'_>) -> serde_json::Value {
    use serde_json::json;
    match value {
        Value::U8(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::I16(v) => json!(v),
        Value::U16(v) => json!(v),
        Value::I32(v) => json!(v),
        Value::U32(v) => json!(v),
        Value::I64(v) => json!(v),
        Value::U64(v) => json!(v),
        Value::F64(v) => json!(v),
        Value::Str(s) => json!(s.as_str()),
        Value::ObjectPath(p) => json!(p.as_str()),
        Value::Signature(s) => json!(s.to_string()),
        Value::Value(inner) => value_to_json(inner),
        other => json!(format!("{other:?}")),
    }
}

/// `Properties.Set` arguments: interface, property, variant value.
fn property_set_body<'a>(
    interface: &'a str,
    property: &'a str,
    value: &serde_json::Value,
) -> Result<(&'a str, &'a str, Value<'static>), BusError> {
    Ok((interface, property, json_to_value(value)?))
}

fn json_to_value(arg: &serde_json::Value) -> Result<Value<'static>, BusError> {
    match arg {
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::String(s) => Ok(Value::from(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i32::try_from(i).map_or(Value::I64(i), Value::I32))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::U64(u))
            } else {
                n.as_f64()
                    .map(Value::F64)
                    .ok_or_else(|| BusError::UnsupportedArgument(n.to_string()))
            }
        }
        other => Err(BusError::UnsupportedArgument(other.to_string())),
    }
}

#[async_trait]
impl BusConnection for ZbusConnection {
    fn bus(&self) -> BusHandle {
        self.bus
    }

    async fn add_match(&self, rule: &FilterRule) -> Result<(), BusError> {
        self.daemon_match_call("AddMatch", rule).await
    }

    async fn remove_match(&self, rule: &FilterRule) -> Result<(), BusError> {
        self.daemon_match_call("RemoveMatch", rule).await
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
        let target = format!("{DBUS_INTERFACE}.ListNames");
        let call = self
            .conn
            .call_method(Some(DBUS_NAME), DBUS_PATH, Some(DBUS_INTERFACE), "ListNames", &());
        let reply = self.timed(&target, call).await?;
        reply
            .body()
            .deserialize::<Vec<String>>()
            .map_err(|e| BusError::call_failed(target, e))
    }

    async fn name_owner(&self, name: &str) -> Result<String, BusError> {
        self.ensure_open()?;
        let target = format!("{DBUS_INTERFACE}.GetNameOwner({name})");
        let call = self.conn.call_method(
            Some(DBUS_NAME),
            DBUS_PATH,
            Some(DBUS_INTERFACE),
            "GetNameOwner",
            &name,
        );
        let reply = self.timed(&target, call).await?;
        reply
            .body()
            .deserialize::<String>()
            .map_err(|e| BusError::call_failed(target, e))
    }

    async fn introspect(&self, service: &str, path: &str) -> Result<String, BusError> {
        self.ensure_open()?;
        let target = format!("{service} {path} {INTROSPECTABLE_INTERFACE}.Introspect");
        let call = self.conn.call_method(
            Some(service),
            path,
            Some(INTROSPECTABLE_INTERFACE),
            "Introspect",
            &(),
        );
        let reply = self.timed(&target, call).await?;
        reply
            .body()
            .deserialize::<String>()
            .map_err(|e| BusError::call_failed(target, e))
    }

    async fn call_method(&self, call: &MethodCall) -> Result<Vec<serde_json::Value>, BusError> {
        self.ensure_open()?;
        let target = call.target();
        let fields = call
            .args
            .iter()
            .map(json_to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let destination = call.destination.as_str();
        let path = call.path.as_str();
        let interface = call.interface.as_str();
        let member = call.member.as_str();

        let reply = if fields.is_empty() {
            let pending =
                self.conn
                    .call_method(Some(destination), path, Some(interface), member, &());
            self.timed(&target, pending).await?
        } else {
            let body = fields
                .into_iter()
                .fold(StructureBuilder::new(), |builder, field| builder.append_field(field))
                .build();
            let pending =
                self.conn
                    .call_method(Some(destination), path, Some(interface), member, &body);
            self.timed(&target, pending).await?
        };

        Ok(match body_to_json(reply.body().deserialize::<Structure<'_>>().ok()) {
            serde_json::Value::Array(values) => values,
            other => vec![other],
        })
    }

    async fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<RawProperty, BusError> {
        self.ensure_open()?;
        let target = format!("{service} {path} {interface}.{property}");
        let body = (interface, property);
        let call = self.conn.call_method(
            Some(service),
            path,
            Some(PROPERTIES_INTERFACE),
            "Get",
            &body,
        );
        let reply = self.timed(&target, call).await?;
        let owned = reply
            .body()
            .deserialize::<OwnedValue>()
            .map_err(|e| BusError::call_failed(&target, e))?;
        let value: &Value<'_> = &owned;
        Ok(RawProperty {
            signature: value.value_signature().to_string(),
            value: value_to_json(value),
        })
    }

    async fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let target = format!("{service} {path} {interface}.{property}");
        let body = property_set_body(interface, property, value)?;
        let call = self.conn.call_method(
            Some(service),
            path,
            Some(PROPERTIES_INTERFACE),
            "Set",
            &body,
        );
        self.timed(&target, call).await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        // With the pump gone this drops the last sender.
        self.sender.lock().take();
        debug!(bus = %self.bus, "Bus connection closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
