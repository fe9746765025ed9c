//! # Bus Explorer Service
//!
//! Stateless translation between caller requests and pooled bus connections.
//! Every operation works on the root object path of the target service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared_bus::{BusConnection, BusConnectionPool};
use shared_types::{
    BusHandle, BusInfo, InterfaceInfo, IntrospectionResult, MethodCall, MethodCallResult,
    MethodInfo, PropertyInfo, PropertyValue, ServiceInfo, SignalInfo, ROOT_PATH,
};
use tracing::{debug, warn};

use crate::error::ExplorerError;
use crate::introspection::parse_introspection;
use crate::ports::BusExplorerApi;

/// Owner reported when `GetNameOwner` fails.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Implements [`BusExplorerApi`] over a shared connection pool.
pub struct BusExplorer {
    pool: Arc<BusConnectionPool>,
}

impl BusExplorer {
    pub fn new(pool: Arc<BusConnectionPool>) -> Self {
        Self { pool }
    }

    fn connection(&self, bus: BusHandle) -> Result<Arc<dyn BusConnection>, ExplorerError> {
        Ok(self.pool.connection(bus)?)
    }
}

#[async_trait]
impl BusExplorerApi for BusExplorer {
    fn list_buses(&self) -> Vec<BusInfo> {
        BusHandle::ALL.into_iter().map(BusInfo::from).collect()
    }

    fn bus_info(&self, name: &str) -> Result<BusInfo, ExplorerError> {
        name.parse::<BusHandle>()
            .map(BusInfo::from)
            .map_err(|_| ExplorerError::InvalidBusType(name.to_string()))
    }

    async fn list_services(&self, bus: BusHandle) -> Result<Vec<String>, ExplorerError> {
        Ok(self.connection(bus)?.list_names().await?)
    }

    async fn service_info(
        &self,
        bus: BusHandle,
        service: &str,
    ) -> Result<ServiceInfo, ExplorerError> {
        let connection = self.connection(bus)?;
        let owner = match connection.name_owner(service).await {
            Ok(owner) => owner,
            Err(e) => {
                debug!(bus = %bus, service, error = %e, "Name owner lookup failed");
                UNKNOWN_OWNER.to_string()
            }
        };

        let introspection = match self.introspect(bus, service).await {
            Ok(result) => result,
            Err(e) => {
                debug!(bus = %bus, service, error = %e, "Service not introspectable");
                return Ok(ServiceInfo {
                    name: service.to_string(),
                    owner,
                    ..Default::default()
                });
            }
        };

        let interfaces = introspection
            .parsed_data
            .as_ref()
            .map(|parsed| parsed.interface_names())
            .unwrap_or_default();

        Ok(ServiceInfo {
            name: service.to_string(),
            owner,
            interfaces,
            object_paths: vec![ROOT_PATH.to_string()],
            introspection: Some(introspection),
        })
    }

    async fn introspect(
        &self,
        bus: BusHandle,
        service: &str,
    ) -> Result<IntrospectionResult, ExplorerError> {
        let xml = self.connection(bus)?.introspect(service, ROOT_PATH).await?;

        // Unparseable documents still return the raw XML.
        let parsed_data = match parse_introspection(&xml) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(bus = %bus, service, error = %e, "Introspection XML not parsed");
                None
            }
        };

        Ok(IntrospectionResult {
            service: service.to_string(),
            object_path: ROOT_PATH.to_string(),
            xml,
            parsed_data,
            timestamp: Utc::now(),
        })
    }

    async fn list_interfaces(
        &self,
        bus: BusHandle,
        service: &str,
    ) -> Result<Vec<String>, ExplorerError> {
        Ok(self.service_info(bus, service).await?.interfaces)
    }

    async fn interface_info(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<InterfaceInfo, ExplorerError> {
        self.service_info(bus, service)
            .await?
            .introspection
            .and_then(|result| result.parsed_data)
            .and_then(|parsed| parsed.interfaces.into_iter().find(|i| i.name == interface))
            .ok_or_else(|| ExplorerError::InterfaceNotFound(interface.to_string()))
    }

    async fn list_methods(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<Vec<MethodInfo>, ExplorerError> {
        Ok(self.interface_info(bus, service, interface).await?.methods)
    }

    async fn list_signals(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<Vec<SignalInfo>, ExplorerError> {
        Ok(self.interface_info(bus, service, interface).await?.signals)
    }

    async fn call_method(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<MethodCallResult, ExplorerError> {
        let connection = self.connection(bus)?;
        let call = MethodCall::new(service, interface, method, args);

        match connection.call_method(&call).await {
            Ok(values) => Ok(MethodCallResult::ok(values)),
            Err(e) => {
                debug!(bus = %bus, target = %call.target(), error = %e, "Method call failed");
                Ok(MethodCallResult::failed(e.to_string()))
            }
        }
    }

    async fn list_properties(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
    ) -> Result<Vec<PropertyInfo>, ExplorerError> {
        let mut properties = self.interface_info(bus, service, interface).await?.properties;
        for prop in properties.iter_mut().filter(|p| p.is_readable()) {
            match self.get_property(bus, service, interface, &prop.name).await {
                Ok(current) => prop.value = Some(current.value),
                Err(e) => {
                    debug!(property = %prop.name, error = %e, "Property value unavailable");
                }
            }
        }
        Ok(properties)
    }

    async fn get_property(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, ExplorerError> {
        let raw = self
            .connection(bus)?
            .get_property(service, ROOT_PATH, interface, property)
            .await?;
        Ok(PropertyValue {
            name: property.to_string(),
            value_type: raw.signature,
            value: raw.value,
            timestamp: Utc::now(),
        })
    }

    async fn set_property(
        &self,
        bus: BusHandle,
        service: &str,
        interface: &str,
        property: &str,
        value: serde_json::Value,
    ) -> Result<PropertyValue, ExplorerError> {
        self.connection(bus)?
            .set_property(service, ROOT_PATH, interface, property, &value)
            .await?;
        self.get_property(bus, service, interface, property).await
    }
}
