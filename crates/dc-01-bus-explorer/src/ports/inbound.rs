//! Inbound Ports (Driving Ports)
//!
//! Read-mostly operations a request gateway exposes for exploring a bus.

use async_trait::async_trait;
use shared_types::{
    BusHandle, BusInfo, InterfaceInfo, IntrospectionResult, MethodCallResult, MethodInfo,
    PropertyInfo, PropertyValue, ServiceInfo, SignalInfo,
};

use crate::error::ExplorerError;

/// Bus explorer API (Driving Port)
#[async_trait]
pub trait BusExplorerApi: Send + Sync {
    /// The known buses and their descriptions.
    fn list_buses(&self) -> Vec<BusInfo>;

    /// Describe a bus by name (`system` or `session`).
    fn bus_info(&self, name: &str) -> Result<BusInfo, ExplorerError>;

    /// Names currently owned on `bus`.
    async fn list_services(&self, bus: BusHandle) -> Result<Vec<String>, ExplorerError>;

    /// Owner and interfaces of a service.
    ///
    /// A service that cannot be introspected is still described by name and
    /// owner.
    async fn service_info(&self, bus: BusHandle, service: &str)
        -> Result<ServiceInfo, ExplorerError>;

    /// Introspect the root object of `service`.
    async fn introspect(
        &self,
        bus: BusHandle,
        service: &str,
    ) -> Result<IntrospectionResult, ExplorerError>;

    async fn list_interfaces(
        &self,
        bus: BusHandle,
        service: &str,
    ) -> Result<Vec<String>, ExplorerError>;

    async fn interface_info(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<InterfaceInfo, ExplorerError>;

    async fn list_methods(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<Vec<MethodInfo>, ExplorerError>;

    async fn list_signals(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<Vec<SignalInfo>, ExplorerError>;

    /// Forward a method call to the root object of `service`.
    ///
    /// A call the bus rejects is reported in the result, not as `Err`.
    async fn call_method(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<MethodCallResult, ExplorerError>;

    /// Properties of an interface with their current values where readable.
    async fn list_properties(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<Vec<PropertyInfo>, ExplorerError>;

    async fn get_property(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, ExplorerError>;

    /// Set a property and return its value as read back from the service.
    async fn set_property(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
        property: &str,
        value: serde_json::Value,
    ) -> Result<PropertyValue, ExplorerError>;
}
