//! Fan-out and aggregate outcome tests for the discovery service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use peerscout::{
    CancellationToken, DiscoveryError, DiscoveryEvent, Driver, DriverOutcome, MemoryRendezvous,
    Operation, Service, ServiceConfig, StaticDriver,
};
use tokio::sync::broadcast;

fn drain_events(events: &mut broadcast::Receiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn test_partial_success_lookup_is_success() {
    init_tracing();

    let rendezvous = MemoryRendezvous::new();
    rendezvous.advertise("chat", random_record(1));

    let service = Service::builder()
        .driver(rendezvous.driver("serving"))
        .driver(rendezvous.driver("declining").decline_lookup())
        .driver(rendezvous.driver("failing").fail_lookup("backend unreachable"))
        .build();
    let mut events = service.events();

    let result = service.lookup_peers(&CancellationToken::new(), "chat").await;
    assert!(result.is_ok(), "lookup should succeed: {result:?}");

    let events = drain_events(&mut events);
    assert_eq!(events.len(), 3);
    assert_eq!(events.iter().filter(|event| event.is_skip_or_failure()).count(), 2);
    assert!(events.iter().any(|event| event.driver == "failing"
        && event.outcome == DriverOutcome::Failed("backend unreachable".to_string())));
    assert!(events.iter().any(|event| event.driver == "declining"
        && event.outcome == DriverOutcome::Skipped));
}

#[tokio::test]
async fn test_total_failure_lookup_forwards_nothing() {
    init_tracing();

    let rendezvous = MemoryRendezvous::new();
    rendezvous.advertise("chat", random_record(1));

    let service = Service::builder()
        .driver(rendezvous.driver("declining").decline_lookup())
        .driver(rendezvous.driver("failing").fail_lookup("timeout"))
        .build();
    let mut events = service.events();

    let result = service.lookup_peers(&CancellationToken::new(), "chat").await;
    assert_eq!(
        result,
        Err(DiscoveryError::NoDriverAvailable {
            operation: Operation::Lookup,
            topic: "chat".to_string()
        })
    );
    assert!(service.known_peers("chat").is_empty());
    assert_eq!(drain_events(&mut events).iter().filter(|e| e.is_skip_or_failure()).count(), 2);
}

#[tokio::test]
async fn test_lookup_without_drivers_fails() {
    let service = Service::new(Vec::new());
    let result = service.lookup_peers(&CancellationToken::new(), "chat").await;
    assert!(matches!(result, Err(DiscoveryError::NoDriverAvailable { .. })));
}

#[tokio::test]
async fn test_lookup_returns_before_streams_drain() {
    init_tracing();

    let flood = FloodDriver::new("flood", 3);
    let service = Service::builder().driver(flood.clone()).build();
    let token = CancellationToken::new();

    // the flood stream never ends, so returning proves we only wait for initiation
    within_second(service.lookup_peers(&token, "chat")).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || service.known_peers("chat").len() == 3).await);
    assert_eq!(flood.live_streams(), 1);

    token.cancel();
    assert!(wait_until(Duration::from_secs(1), || flood.live_streams() == 0).await);
    assert!(wait_until(Duration::from_secs(1), || !service.fade().is_tracking("chat")).await);
}

#[tokio::test]
async fn test_lookup_on_cancelled_scope_reports_cancellation() {
    let service = Service::builder().driver(FloodDriver::new("flood", 1)).build();
    let token = CancellationToken::new();
    token.cancel();

    let result = service.lookup_peers(&token, "chat").await;
    assert!(matches!(result, Err(DiscoveryError::Cancelled { .. })));
}

#[tokio::test]
async fn test_watch_total_failure_returns_early() {
    init_tracing();

    let rendezvous = MemoryRendezvous::new();
    let service = Service::builder()
        .driver(rendezvous.driver("declining").decline_watch())
        .driver(StaticDriver::new("static"))
        .driver(rendezvous.driver("failing").fail_watch("refused"))
        .build();

    let result = within_second(service.watch_topic(&CancellationToken::new(), "chat")).await;
    assert_eq!(
        result,
        Err(DiscoveryError::NoDriverAvailable {
            operation: Operation::Watch,
            topic: "chat".to_string()
        })
    );
}

#[tokio::test]
async fn test_watch_runs_until_cancelled() {
    init_tracing();

    let rendezvous = MemoryRendezvous::new();
    let service = Service::builder()
        .driver(rendezvous.driver("watching"))
        .driver(rendezvous.driver("failing").fail_watch("refused"))
        .build();
    let token = CancellationToken::new();
    let mut events = service.events();

    let watch = {
        let service = service.clone();
        let token = token.clone();
        tokio::spawn(async move { service.watch_topic(&token, "chat").await })
    };

    assert!(wait_until(Duration::from_secs(1), || rendezvous.watcher_count("chat") == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!watch.is_finished());

    let events = drain_events(&mut events);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.operation == Operation::Watch));
    assert_eq!(events.iter().filter(|event| event.is_skip_or_failure()).count(), 1);
    assert!(events.iter().any(|event| event.driver == "failing"
        && event.outcome == DriverOutcome::Failed("refused".to_string())));

    token.cancel();
    let result = within_second(watch).await.unwrap();
    assert!(result.is_ok());
    assert!(wait_until(Duration::from_secs(1), || rendezvous.watcher_count("chat") == 0).await);
}

#[tokio::test]
async fn test_watch_feeds_announcements() {
    let rendezvous = MemoryRendezvous::new();
    let service = Service::builder().driver(rendezvous.driver("watching")).build();
    let token = CancellationToken::new();

    let watch = {
        let service = service.clone();
        let token = token.clone();
        tokio::spawn(async move { service.watch_topic(&token, "chat").await })
    };
    assert!(wait_until(Duration::from_secs(1), || rendezvous.watcher_count("chat") == 1).await);

    let record = random_record(9);
    rendezvous.advertise("chat", record.clone());
    assert!(
        wait_until(Duration::from_secs(1), || service.known_peers("chat") == vec![record.clone()])
            .await
    );

    token.cancel();
    within_second(watch).await.unwrap().unwrap();
}

#[test]
fn test_builder_keeps_config() {
    let config = ServiceConfig::builder()
        .decay_window(Duration::from_secs(7))
        .output_capacity(3)
        .event_capacity(5)
        .build();
    let service = Service::builder().driver(StaticDriver::new("static")).config(config.clone()).build();

    assert_eq!(service.config(), &config);
    assert_eq!(service.driver_names(), vec!["static"]);
}

#[test]
fn test_driver_names_keep_registration_order() {
    let rendezvous = MemoryRendezvous::new();
    let drivers: Vec<Arc<dyn Driver>> = vec![
        Arc::new(StaticDriver::new("static")),
        Arc::new(rendezvous.driver("mdns")),
        Arc::new(rendezvous.driver("dht")),
    ];
    let service = Service::new(drivers);

    assert_eq!(service.driver_names(), vec!["static", "mdns", "dht"]);
}
