//! # Runtime Lifecycle
//!
//! The controller runtime wiring the pool, the explorer and the signal hub,
//! then shutting them down.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dc_02_signal_hub::SignalError;
    use dc_runtime::{ControllerRuntime, RuntimeConfig};
    use shared_bus::{BusConnectionPool, InMemoryBusConnection, InMemoryService};
    use shared_types::BusHandle;
    use tokio::time::timeout;

    use crate::integration::{in_memory_pool, name_owner_changed};

    fn runtime() -> (ControllerRuntime, Arc<InMemoryBusConnection>) {
        let (pool, system, _) = in_memory_pool();
        let config = RuntimeConfig::from_lookup(|key| match key {
            "DC_QUEUE_CAPACITY" => Some("4".to_string()),
            _ => None,
        });
        (ControllerRuntime::with_pool(config, pool), system)
    }

    #[tokio::test]
    async fn test_explorer_and_signals_share_one_connection() {
        let (runtime, system) = runtime();
        system.register_service("org.example.Daemon", InMemoryService::new(":1.4"));

        let sub = runtime
            .signals()
            .subscribe(BusHandle::System, "", "org.freedesktop.DBus", "NameOwnerChanged")
            .await
            .unwrap();
        let services = runtime
            .explorer()
            .list_services(BusHandle::System)
            .await
            .unwrap();
        assert!(services.contains(&"org.example.Daemon".to_string()));

        system.emit(name_owner_changed("org.example.Daemon", "", ":1.4"));
        let event = runtime
            .signals()
            .next_event(&sub.id, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(event.is_some());
        assert_eq!(runtime.registry().config().queue_capacity, 4);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything_once() {
        let (runtime, system) = runtime();
        runtime
            .signals()
            .subscribe(BusHandle::System, "", "org.freedesktop.DBus", "NameOwnerChanged")
            .await
            .unwrap();

        timeout(Duration::from_secs(1), async {
            tokio::join!(runtime.shutdown(), runtime.shutdown());
        })
        .await
        .unwrap();

        assert!(runtime.is_shut_down());
        assert_eq!(runtime.registry().active_count(), 0);
        assert_eq!(system.active_match_count(), 0);
        assert!(runtime.pool().available_buses().is_empty());
        assert_eq!(
            runtime
                .signals()
                .subscribe(BusHandle::System, "", "org.freedesktop.DBus", "NameOwnerChanged")
                .await,
            Err(SignalError::ShuttingDown)
        );
    }

    #[tokio::test]
    async fn test_runtime_without_connections_reports_unavailable() {
        let runtime = ControllerRuntime::with_pool(
            RuntimeConfig::default(),
            Arc::new(BusConnectionPool::new()),
        );
        assert!(matches!(
            runtime
                .signals()
                .subscribe(BusHandle::Session, "", "org.example", "Tick")
                .await,
            Err(SignalError::ConnectionUnavailable(BusHandle::Session))
        ));
        runtime.shutdown().await;
    }

    // Passes with or without a reachable bus daemon.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_then_shutdown_releases_every_bus() {
        let runtime = timeout(
            Duration::from_secs(10),
            ControllerRuntime::start(RuntimeConfig::default()),
        )
        .await
        .expect("start did not finish")
        .unwrap();
        let pool = runtime.pool();
        assert!(pool.available_buses().iter().all(|bus| pool.is_available(*bus)));

        runtime.shutdown().await;
        assert!(runtime.is_shut_down());
        assert!(runtime.pool().available_buses().is_empty());
    }
}
