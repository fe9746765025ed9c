//! # Signal Subscription Flows
//!
//! Pool + registry + dispatcher + delivery queue, driven through the
//! in-memory bus.
//!
//! ## Flows Tested
//!
//! 1. `NameOwnerChanged` delivered end to end, other members filtered out
//! 2. Subscribe/unsubscribe leaves no match rule on the bus
//! 3. Full queues drop the newest event and count it once
//! 4. Concurrent identical subscribes converge on one subscription
//! 5. `close_all` is idempotent, silences every subscription before the
//!    match rules are released, and is safe against in-flight subscribes
//! 6. Connection teardown closes subscriptions but keeps unread events

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dc_02_signal_hub::{SignalError, SignalHubConfig, SubscriptionRegistry};
    use serde_json::json;
    use shared_bus::BusConnection;
    use shared_types::{BusHandle, FilterRule, RawEvent, SubscriptionStatus};
    use tokio::time::timeout;

    use crate::integration::{in_memory_pool, name_owner_changed};

    const DBUS: &str = "org.freedesktop.DBus";
    const OWNER_CHANGED: &str = "NameOwnerChanged";
    const WAIT: Duration = Duration::from_secs(1);

    fn registry_with(config: SignalHubConfig) -> (
        Arc<SubscriptionRegistry>,
        Arc<shared_bus::InMemoryBusConnection>,
        Arc<shared_bus::InMemoryBusConnection>,
    ) {
        let (pool, system, session) = in_memory_pool();
        (
            Arc::new(SubscriptionRegistry::new(pool, config)),
            system,
            session,
        )
    }

    async fn wait_until_seen(registry: &SubscriptionRegistry, id: &str, total: u64) {
        timeout(WAIT, async {
            loop {
                let sub = registry.get(id).unwrap();
                if sub.delivered + sub.dropped >= total {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("dispatcher did not catch up");
    }

    // =========================================================================
    // END-TO-END DELIVERY
    // =========================================================================

    #[tokio::test]
    async fn test_name_owner_changed_is_delivered_and_name_lost_is_not() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());
        let sub = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        assert_eq!(sub.id, "system::org.freedesktop.DBus:NameOwnerChanged");

        system.emit(RawEvent::new(":1.7", DBUS, "NameLost", "/", json!(["org.x"])));
        system.emit(name_owner_changed("org.example.Player", "", ":1.42"));

        let event = registry.next_event(&sub.id, Some(WAIT)).await.unwrap().unwrap();
        assert_eq!(event.member, OWNER_CHANGED);
        assert_eq!(event.payload, json!(["org.example.Player", "", ":1.42"]));
        assert!(registry.poll(&sub.id, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sender_filter_only_passes_that_sender() {
        let (registry, _, session) = registry_with(SignalHubConfig::default());
        let sub = registry
            .subscribe(BusHandle::Session, ":1.9", "org.example.Clock", "Tick")
            .await
            .unwrap();

        session.emit(RawEvent::new(":1.8", "org.example.Clock", "Tick", "/", json!([1])));
        session.emit(RawEvent::new(":1.9", "org.example.Clock", "Tick", "/", json!([2])));

        let event = registry.next_event(&sub.id, Some(WAIT)).await.unwrap().unwrap();
        assert_eq!(event.payload, json!([2]));
        assert_eq!(registry.next_event(&sub.id, Some(Duration::from_millis(30))).await, Ok(None));
    }

    #[tokio::test]
    async fn test_subscriptions_on_different_buses_are_isolated() {
        let (registry, system, session) = registry_with(SignalHubConfig::default());
        let on_system = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        let on_session = registry
            .subscribe(BusHandle::Session, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        assert_ne!(on_system.id, on_session.id);

        session.emit(name_owner_changed("org.session.App", "", ":1.3"));

        let event = registry
            .next_event(&on_session.id, Some(WAIT))
            .await
            .unwrap();
        assert!(event.is_some());
        assert!(registry.poll(&on_system.id, 10).unwrap().is_empty());
        assert_eq!(system.active_match_count(), 1);
        assert_eq!(session.active_match_count(), 1);
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_subscribe_then_unsubscribe_leaves_nothing_behind() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());
        let receivers_before = system.feed_receiver_count();

        let sub = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        assert_eq!(registry.active_count(), 1);
        assert_eq!(system.active_match_count(), 1);

        let closed = registry.unsubscribe(&sub.id).await.unwrap();
        assert_eq!(closed.status, SubscriptionStatus::Closed);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(system.active_match_count(), 0);
        assert_eq!(system.feed_receiver_count(), receivers_before);
        assert!(registry.get(&sub.id).is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_and_changes_nothing() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());
        registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        let before = registry.list();

        let result = registry.unsubscribe("system::org.example:Nothing").await;
        assert_eq!(
            result,
            Err(SignalError::NotFound("system::org.example:Nothing".into()))
        );
        assert_eq!(registry.list(), before);
        assert_eq!(system.active_match_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_add_match_stores_nothing() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());
        system.fail_add_match(Some("org.freedesktop.DBus.Error.AccessDenied"));

        let result = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await;
        assert!(matches!(result, Err(SignalError::FilterRegistration { .. })));
        assert!(registry.list().is_empty());

        system.fail_add_match(None);
        assert!(registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .is_ok());
    }

    // =========================================================================
    // BACKPRESSURE
    // =========================================================================

    #[tokio::test]
    async fn test_full_queue_drops_newest_and_counts_each_drop() {
        let config = SignalHubConfig {
            queue_capacity: 3,
            ..Default::default()
        };
        let (registry, system, _) = registry_with(config);
        let sub = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();

        for n in 0..5 {
            system.emit(name_owner_changed(&format!("org.n{n}"), "", ":1.1"));
        }
        wait_until_seen(&registry, &sub.id, 5).await;
        assert_eq!(registry.dropped_count(&sub.id), Ok(2));

        // One more matching event while still full: exactly one more drop.
        system.emit(name_owner_changed("org.n5", "", ":1.1"));
        wait_until_seen(&registry, &sub.id, 6).await;
        assert_eq!(registry.dropped_count(&sub.id), Ok(3));

        let kept: Vec<_> = registry
            .poll(&sub.id, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.payload[0].clone())
            .collect();
        assert_eq!(kept, vec![json!("org.n0"), json!("org.n1"), json!("org.n2")]);

        // Room again: delivery resumes.
        system.emit(name_owner_changed("org.n6", "", ":1.1"));
        let next = registry.next_event(&sub.id, Some(WAIT)).await.unwrap().unwrap();
        assert_eq!(next.payload[0], json!("org.n6"));
    }

    #[tokio::test]
    async fn test_non_matching_events_never_count_as_drops() {
        let config = SignalHubConfig {
            queue_capacity: 1,
            ..Default::default()
        };
        let (registry, system, _) = registry_with(config);
        let sub = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();

        system.emit(name_owner_changed("org.a", "", ":1.1"));
        for _ in 0..10 {
            system.emit(RawEvent::new(":1.1", DBUS, "NameAcquired", "/", json!([])));
        }
        wait_until_seen(&registry, &sub.id, 1).await;
        // Give the dispatcher time to walk past the non-matching events.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.dropped_count(&sub.id), Ok(0));
    }

    // =========================================================================
    // CONCURRENCY
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_subscribes_converge() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());
        let rule = FilterRule::new(BusHandle::System, "", DBUS, OWNER_CHANGED).unwrap();

        let (a, b) = tokio::join!(
            {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
                        .await
                })
            },
            {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
                        .await
                })
            }
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(registry.list().len(), 1);
        assert_eq!(system.match_count(&rule), 1);

        // One dispatcher: an event is delivered once.
        system.emit(name_owner_changed("org.once", "", ":1.1"));
        assert!(registry.next_event(&a.id, Some(WAIT)).await.unwrap().is_some());
        assert_eq!(
            registry.next_event(&a.id, Some(Duration::from_millis(30))).await,
            Ok(None)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_subscribes_for_many_ids() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());

        let tasks: Vec<_> = (0..32)
            .map(|n| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let member = format!("Signal{}", n % 8);
                    registry
                        .subscribe(BusHandle::System, "", "org.example", &member)
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(registry.active_count(), 8);
        assert_eq!(system.active_match_count(), 8);
    }

    #[tokio::test]
    async fn test_close_all_twice_releases_once() {
        let (registry, system, session) = registry_with(SignalHubConfig::default());
        registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        registry
            .subscribe(BusHandle::Session, "", "org.example.Clock", "Tick")
            .await
            .unwrap();

        // Another client holds the same rule; a double release would take it.
        let rule = FilterRule::new(BusHandle::System, "", DBUS, OWNER_CHANGED).unwrap();
        system.add_match(&rule).await.unwrap();
        assert_eq!(system.match_count(&rule), 2);

        registry.close_all().await;
        registry.close_all().await;

        assert_eq!(registry.active_count(), 0);
        assert_eq!(system.match_count(&rule), 1);
        assert_eq!(session.active_match_count(), 0);
        assert_eq!(
            registry
                .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
                .await,
            Err(SignalError::ShuttingDown)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_all_silences_both_buses_before_slow_match_release() {
        let (registry, system, session) = registry_with(SignalHubConfig::default());
        let mut ids = Vec::new();
        for member in ["Tick", "Tock", "Chime"] {
            ids.push(
                registry
                    .subscribe(BusHandle::System, "", "org.example.Clock", member)
                    .await
                    .unwrap()
                    .id,
            );
            ids.push(
                registry
                    .subscribe(BusHandle::Session, "", "org.example.Clock", member)
                    .await
                    .unwrap()
                    .id,
            );
        }
        system.delay_remove_match(Some(Duration::from_millis(250)));
        session.delay_remove_match(Some(Duration::from_millis(250)));

        let started = std::time::Instant::now();
        let closing = tokio::spawn({
            let registry = registry.clone();
            async move { registry.close_all().await }
        });

        timeout(WAIT, async {
            while system.feed_receiver_count() + session.feed_receiver_count() > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("dispatchers still running");

        assert!(!closing.is_finished());
        assert!(ids.iter().all(|id| registry.get(id).is_none()));
        assert_eq!(system.active_match_count(), 3);
        assert_eq!(
            registry
                .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
                .await,
            Err(SignalError::ShuttingDown)
        );

        timeout(WAIT, closing).await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(750));
        assert_eq!(system.active_match_count(), 0);
        assert_eq!(session.active_match_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_all_racing_subscribes_leaves_nothing_active() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());

        let subscribers: Vec<_> = (0..16)
            .map(|n| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .subscribe(BusHandle::System, "", "org.example", &format!("S{n}"))
                        .await
                })
            })
            .collect();
        let closers: Vec<_> = (0..2)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.close_all().await })
            })
            .collect();

        for result in futures::future::join_all(subscribers).await {
            match result.unwrap() {
                Ok(_) | Err(SignalError::ShuttingDown) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        futures::future::join_all(closers).await;

        assert!(registry.is_closed());
        assert_eq!(registry.active_count(), 0);
        assert_eq!(system.active_match_count(), 0);
    }

    // =========================================================================
    // CONNECTION TEARDOWN
    // =========================================================================

    #[tokio::test]
    async fn test_connection_close_keeps_unread_events_readable() {
        let (registry, system, _) = registry_with(SignalHubConfig::default());
        let sub = registry
            .subscribe(BusHandle::System, "", DBUS, OWNER_CHANGED)
            .await
            .unwrap();
        system.emit(name_owner_changed("org.last", "", ":1.1"));
        wait_until_seen(&registry, &sub.id, 1).await;

        system.close().await;
        timeout(WAIT, async {
            while registry.get(&sub.id).map(|s| s.is_active()).unwrap_or(false) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(registry.active_count(), 0);

        let unread = registry.next_event(&sub.id, Some(WAIT)).await.unwrap();
        assert_eq!(unread.map(|e| e.payload[0].clone()), Some(json!("org.last")));
        // Closed and empty: returns at once.
        assert_eq!(
            timeout(WAIT, registry.next_event(&sub.id, Some(Duration::from_secs(30))))
                .await
                .unwrap(),
            Ok(None)
        );

        // Already closed by teardown: reaped and reported as not found.
        assert!(matches!(
            registry.unsubscribe(&sub.id).await,
            Err(SignalError::NotFound(_))
        ));
        assert!(registry.get(&sub.id).is_none());
    }
}
