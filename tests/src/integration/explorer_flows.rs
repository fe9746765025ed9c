//! # Bus Explorer Flows
//!
//! Explorer service over the shared pool, against services registered on the
//! in-memory bus.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dc_01_bus_explorer::{BusExplorer, BusExplorerApi, ExplorerError, UNKNOWN_OWNER};
    use serde_json::json;
    use shared_bus::{BusConnectionPool, BusError, InMemoryBusConnection, InMemoryService};
    use shared_types::BusHandle;

    use crate::integration::in_memory_pool;

    const NOTIFY: &str = "org.freedesktop.Notifications";
    const NOTIFY_XML: &str = r#"<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
 "http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node>
  <interface name="org.freedesktop.Notifications">
    <method name="GetServerInformation">
      <arg type="s" name="name" direction="out"/>
      <arg type="s" name="vendor" direction="out"/>
    </method>
    <method name="CloseNotification">
      <arg type="u" name="id" direction="in"/>
    </method>
    <signal name="NotificationClosed">
      <arg type="u" name="id"/>
      <arg type="u" name="reason"/>
    </signal>
    <property name="Inhibited" type="b" access="read"/>
    <property name="Volume" type="d" access="readwrite"/>
    <property name="Secret" type="s" access="write"/>
  </interface>
  <interface name="org.freedesktop.DBus.Properties"/>
  <node name="org"/>
</node>"#;

    fn notifications() -> InMemoryService {
        InMemoryService::new(":1.20")
            .with_object("/", NOTIFY_XML)
            .with_property(NOTIFY, "Inhibited", "b", json!(false))
            .with_property(NOTIFY, "Volume", "d", json!(0.5))
            .with_method(
                NOTIFY,
                "GetServerInformation",
                Ok(vec![json!("notifyd"), json!("example")]),
            )
            .with_method(
                NOTIFY,
                "CloseNotification",
                Err("org.freedesktop.DBus.Error.InvalidArgs".into()),
            )
    }

    fn explorer() -> (BusExplorer, Arc<InMemoryBusConnection>) {
        let (pool, _, session) = in_memory_pool();
        session.register_service(NOTIFY, notifications());
        (BusExplorer::new(pool), session)
    }

    #[tokio::test]
    async fn test_service_discovery() {
        let (explorer, _) = explorer();

        let names = explorer.list_services(BusHandle::Session).await.unwrap();
        assert!(names.contains(&NOTIFY.to_string()));
        assert!(names.contains(&"org.freedesktop.DBus".to_string()));

        let info = explorer.service_info(BusHandle::Session, NOTIFY).await.unwrap();
        assert_eq!(info.owner, ":1.20");
        assert_eq!(
            info.interfaces,
            vec![NOTIFY.to_string(), "org.freedesktop.DBus.Properties".to_string()]
        );
        assert_eq!(info.object_paths, vec!["/".to_string()]);
        let parsed = info.introspection.unwrap().parsed_data.unwrap();
        assert_eq!(parsed.nodes[0].path, "/org");
    }

    #[tokio::test]
    async fn test_unknown_service_is_still_described() {
        let (explorer, _) = explorer();
        let info = explorer
            .service_info(BusHandle::Session, "org.example.Missing")
            .await
            .unwrap();
        assert_eq!(info.owner, UNKNOWN_OWNER);
        assert!(info.interfaces.is_empty());
        assert!(info.introspection.is_none());
    }

    #[tokio::test]
    async fn test_interface_members() {
        let (explorer, _) = explorer();

        let methods = explorer
            .list_methods(BusHandle::Session, NOTIFY, NOTIFY)
            .await
            .unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].out_args.len(), 2);
        assert_eq!(methods[1].in_args[0].name, "id");

        let signals = explorer
            .list_signals(BusHandle::Session, NOTIFY, NOTIFY)
            .await
            .unwrap();
        assert_eq!(signals[0].name, "NotificationClosed");
        assert!(signals[0].args.iter().all(|a| a.direction == "out"));

        let missing = explorer
            .interface_info(BusHandle::Session, NOTIFY, "org.example.Nope")
            .await;
        assert_eq!(
            missing,
            Err(ExplorerError::InterfaceNotFound("org.example.Nope".into()))
        );
    }

    #[tokio::test]
    async fn test_method_calls_report_bus_errors_in_result() {
        let (explorer, _) = explorer();

        let ok = explorer
            .call_method(BusHandle::Session, NOTIFY, NOTIFY, "GetServerInformation", vec![])
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.return_values, vec![json!("notifyd"), json!("example")]);

        let failed = explorer
            .call_method(BusHandle::Session, NOTIFY, NOTIFY, "CloseNotification", vec![json!(7)])
            .await
            .unwrap();
        assert!(!failed.success);
        assert!(failed.error.contains("InvalidArgs"));
    }

    #[tokio::test]
    async fn test_properties_read_and_write() {
        let (explorer, _) = explorer();

        let props = explorer
            .list_properties(BusHandle::Session, NOTIFY, NOTIFY)
            .await
            .unwrap();
        let value_of = |name: &str| {
            props
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.value.clone())
        };
        assert_eq!(value_of("Inhibited"), Some(json!(false)));
        assert_eq!(value_of("Volume"), Some(json!(0.5)));
        // Write-only: never read.
        assert_eq!(value_of("Secret"), None);

        let updated = explorer
            .set_property(BusHandle::Session, NOTIFY, NOTIFY, "Volume", json!(0.8))
            .await
            .unwrap();
        assert_eq!(updated.value, json!(0.8));
        assert_eq!(updated.value_type, "d");
    }

    #[tokio::test]
    async fn test_unavailable_bus_fails_fast() {
        let session = Arc::new(InMemoryBusConnection::new(BusHandle::Session));
        let pool = Arc::new(BusConnectionPool::new().with_connection(session));
        let explorer = BusExplorer::new(pool);

        assert_eq!(
            explorer.list_services(BusHandle::System).await,
            Err(ExplorerError::Bus(BusError::ConnectionUnavailable(
                BusHandle::System
            )))
        );
        // Connection lookup failure is an error even for method calls.
        assert!(explorer
            .call_method(BusHandle::System, NOTIFY, NOTIFY, "GetServerInformation", vec![])
            .await
            .is_err());
        assert_eq!(explorer.list_buses().len(), 2);
    }
}
