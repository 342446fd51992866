//! End-to-end lifecycle tests: poller + monitor + history store.
//!
//! These run against the mock bridge and an in-memory backend. The test at
//! the bottom talks to a real bridge and is ignored by default:
//! `SHIFTLIGHT_BRIDGE=http://192.168.4.1 cargo test -p shiftlight-core --test lifecycle -- --ignored`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use shiftlight_core::{
    Bridge, BridgeClient, Error, MockBridge, MonitorEvent, Poller, PollerConfig, ScanOptions,
    scan,
};
use shiftlight_store::{HistoryStore, MemoryBackend};
use shiftlight_types::{BleStatus, DeviceIdentity, DiscoveredDevice, REASON_CONNECTION_FAILED};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

type Store = HistoryStore<MemoryBackend>;

fn obd() -> DeviceIdentity {
    DeviceIdentity::new("AA:BB:CC:DD:EE:01", "OBDII")
}

fn vlink() -> DeviceIdentity {
    DeviceIdentity::new("AA:BB:CC:DD:EE:02", "V-LINK")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("shiftlight_core=debug")
        .with_test_writer()
        .try_init();
}

fn setup(bridge: &MockBridge) -> (Arc<Poller<MockBridge, Store>>, MemoryBackend) {
    init_tracing();
    let backend = MemoryBackend::new();
    let store = HistoryStore::with_backend(backend.clone()).unwrap();
    let poller = Poller::new(
        bridge.clone(),
        Arc::new(Mutex::new(store)),
        PollerConfig::default(),
    )
    .unwrap();
    (Arc::new(poller), backend)
}

async fn run_for(poller: &Arc<Poller<MockBridge, Store>>, duration: Duration) {
    let cancel = CancellationToken::new();
    let p = Arc::clone(poller);
    let token = cancel.clone();
    let handle = tokio::spawn(async move { p.run(token).await });

    tokio::time::sleep(duration).await;
    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_session_is_persisted() {
    let bridge = MockBridge::builder()
        .statuses([
            BleStatus::disconnected(),
            BleStatus::connected_to(obd()),
            BleStatus::new(true, None),
            BleStatus::disconnected(),
        ])
        .build();
    let (poller, backend) = setup(&bridge);

    // Ticks at 0, 3, 6 and 9 seconds
    run_for(&poller, Duration::from_secs(10)).await;

    let store = poller.sink().lock().await;
    let device = store.get_device(&obd().address).unwrap();
    assert_eq!(device.total_connections(), 2);
    assert_eq!(device.successful_connections(), 1);
    assert_eq!(device.failed_connections(), 1);
    assert_eq!(device.history()[0].duration, Some(6000));
    assert!(device.last_connected().is_some());
    // Edge-produced successes never carry a duration
    assert_eq!(device.average_connection_duration(), None);

    // Everything reached the backend
    drop(store);
    let reopened = HistoryStore::with_backend(backend).unwrap();
    assert_eq!(
        reopened.get_device(&obd().address).unwrap().total_connections(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_device_switch_and_ordering() {
    let bridge = MockBridge::builder()
        .statuses([
            BleStatus::connected_to(obd()),
            BleStatus::disconnected(),
            BleStatus::connected_to(vlink()),
        ])
        .build();
    let (poller, _) = setup(&bridge);

    run_for(&poller, Duration::from_secs(7)).await;

    let mut store = poller.sink().lock().await;
    let order: Vec<_> = store.list_sorted().iter().map(|d| d.name().to_string()).collect();
    assert_eq!(order, ["V-LINK", "OBDII"]);

    store.toggle_favorite(&obd().address).unwrap();
    let order: Vec<_> = store.list_sorted().iter().map(|d| d.name().to_string()).collect();
    assert_eq!(order, ["OBDII", "V-LINK"]);
}

#[tokio::test]
async fn test_failed_connect_is_persisted() {
    let bridge = MockBridge::builder().fail_connect(true).build();
    let (poller, _) = setup(&bridge);

    assert!(poller.connect(&obd()).await.is_err());
    assert!(poller.connect(&obd()).await.is_err());

    let store = poller.sink().lock().await;
    let device = store.get_device(&obd().address).unwrap();
    assert_eq!(device.total_connections(), 2);
    assert_eq!(device.failed_connections(), 2);
    assert_eq!(device.average_connection_duration(), None);
    assert_eq!(
        device.history()[0].disconnect_reason.as_deref(),
        Some(REASON_CONNECTION_FAILED)
    );
}

#[tokio::test]
async fn test_failed_connect_with_failing_store_reports_both() {
    let bridge = MockBridge::builder().fail_connect(true).build();
    let (poller, backend) = setup(&bridge);
    backend.set_fail_writes(true);

    let err = poller.connect(&obd()).await.unwrap_err();
    match &err {
        Error::Record { connect, .. } => assert!(matches!(**connect, Error::ConnectFailed(_))),
        other => panic!("expected a record error, got {:?}", other),
    }
    assert!(err.to_string().contains("failed attempt not saved"));

    assert!(poller.sink().lock().await.is_empty());
    assert!(backend.raw(shiftlight_store::STORE_KEY).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_connect_then_poll_records_success() {
    let bridge = MockBridge::new();
    let (poller, _) = setup(&bridge);

    poller.connect(&obd()).await.unwrap();
    run_for(&poller, Duration::from_secs(1)).await;

    let store = poller.sink().lock().await;
    let device = store.get_device(&obd().address).unwrap();
    assert_eq!(device.successful_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_keeps_polling() {
    let bridge = MockBridge::builder()
        .statuses([BleStatus::connected_to(obd()), BleStatus::disconnected()])
        .build();
    let (poller, backend) = setup(&bridge);
    let mut events = poller.subscribe();
    backend.set_fail_writes(true);

    run_for(&poller, Duration::from_secs(4)).await;

    let mut record_failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, MonitorEvent::RecordFailed { .. }) {
            record_failures += 1;
        }
    }
    assert_eq!(record_failures, 2);

    // Memory stayed consistent with the (unchanged) backend
    let store = poller.sink().lock().await;
    assert!(store.is_empty());
    assert!(!poller.monitor().await.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_scan_lists_discovered_devices() {
    let bridge = MockBridge::builder()
        .discovered(vec![DiscoveredDevice {
            address: vlink().address,
            name: vlink().name,
            rssi: Some(-58),
        }])
        .build();

    let devices = scan(&bridge, &ScanOptions::default()).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].identity(), vlink());
}

#[tokio::test]
#[ignore = "requires a ShiftLight bridge on the network"]
async fn test_real_bridge_status() {
    let url = env::var("SHIFTLIGHT_BRIDGE").unwrap_or_else(|_| "http://192.168.4.1".to_string());
    let client = BridgeClient::new(&url).unwrap();

    match client.fetch_status().await {
        Ok(status) => println!("{:#?}", status),
        Err(e) => panic!("Status fetch from {} failed: {}", url, e),
    }
}
