//! Background status polling.
//!
//! The [`Poller`] fetches a status snapshot on a fixed interval, feeds it to
//! the [`LifecycleMonitor`] and records every resulting attempt into an
//! [`AttemptSink`] (normally the history store). It also routes
//! user-initiated connect requests so that immediate failures are recorded.
//!
//! Polling is sequential: a tick that comes due while the previous fetch is
//! still running is skipped, never run concurrently.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shiftlight_types::{AttemptSink, BleStatus, ConnectionAttempt, DeviceIdentity};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, MonitorEvent};
use crate::monitor::{LifecycleMonitor, Transition};
use crate::traits::Bridge;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of connect attempts the bridge makes per request.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Configuration for the [`Poller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between status fetches.
    pub interval: Duration,
    /// Connect attempts requested from the bridge per connect.
    pub connect_attempts: u32,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            event_capacity: 100,
        }
    }
}

impl PollerConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the polling interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the polling interval in seconds.
    pub fn interval_secs(mut self, secs: u64) -> Self {
        self.interval = Duration::from_secs(secs);
        self
    }

    /// Set the connect attempts passed to the bridge.
    pub fn connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::invalid_config(
                "poll interval must be greater than zero",
            ));
        }
        if self.connect_attempts == 0 {
            return Err(Error::invalid_config(
                "connect_attempts must be at least 1",
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config(
                "event_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Wall-clock time derived from a monotonic clock.
///
/// Session durations come from differences between these timestamps, so they
/// are unaffected by wall-clock adjustments while the poller runs.
#[derive(Debug, Clone, Copy)]
struct Clock {
    wall: OffsetDateTime,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: OffsetDateTime::now_utc(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> OffsetDateTime {
        self.wall + self.mono.elapsed()
    }
}

/// Drives a [`LifecycleMonitor`] from a [`Bridge`] and records attempts.
///
/// The sink is shared behind an async mutex so that other code (a CLI
/// listing devices, for example) can read it while polling runs.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use shiftlight_core::{BridgeClient, Poller, PollerConfig};
/// use shiftlight_types::ConnectionAttempt;
/// use tokio::sync::Mutex;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> shiftlight_core::Result<()> {
/// let bridge = BridgeClient::new("http://192.168.4.1")?;
/// let sink = Arc::new(Mutex::new(Vec::<ConnectionAttempt>::new()));
/// let poller = Poller::new(bridge, sink, PollerConfig::default())?;
///
/// let cancel = CancellationToken::new();
/// poller.run(cancel.clone()).await;
/// # Ok(())
/// # }
/// ```
pub struct Poller<B, S> {
    bridge: B,
    sink: Arc<Mutex<S>>,
    monitor: Mutex<LifecycleMonitor>,
    events: EventDispatcher,
    config: PollerConfig,
    clock: Clock,
}

impl<B: Bridge, S: AttemptSink> Poller<B, S> {
    /// Create a poller. Fails if `config` is invalid.
    pub fn new(bridge: B, sink: Arc<Mutex<S>>, config: PollerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            bridge,
            sink,
            monitor: Mutex::new(LifecycleMonitor::new()),
            events: EventDispatcher::new(config.event_capacity),
            config,
            clock: Clock::start(),
        })
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Snapshot of the current monitor state.
    pub async fn monitor(&self) -> LifecycleMonitor {
        self.monitor.lock().await.clone()
    }

    /// The bridge being polled.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// The shared attempt sink.
    pub fn sink(&self) -> &Arc<Mutex<S>> {
        &self.sink
    }

    /// The active configuration.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll until `cancel` fires.
    ///
    /// Fetch errors are logged and skipped; they never produce attempts.
    /// Cancelling while a fetch is in flight abandons that fetch only, and
    /// a snapshot that was already fetched is always fully processed. The
    /// monitor state is kept, so calling `run` again resumes where it left
    /// off.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Polling bridge every {:?}", self.config.interval);

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut consecutive_failures = 0u32;

        loop {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = self.bridge.fetch_status() => result,
                },
            };

            match fetched {
                Ok(status) => {
                    if consecutive_failures > 0 {
                        info!(
                            "Bridge reachable again after {} failed poll(s)",
                            consecutive_failures
                        );
                    }
                    consecutive_failures = 0;
                    self.process(&status).await;
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if consecutive_failures <= 3 {
                        warn!(
                            "Failed to poll bridge: {} (attempt {})",
                            e, consecutive_failures
                        );
                    } else if consecutive_failures == 4 {
                        error!(
                            "Failed to poll bridge after {} attempts, will continue trying silently",
                            consecutive_failures
                        );
                    }
                    self.events.send(MonitorEvent::PollFailed {
                        error: e.to_string(),
                        consecutive_failures,
                    });
                }
            }
        }

        info!("Poller stopped");
    }

    /// Fetch one snapshot and process it.
    pub async fn poll_once(&self) -> Result<Option<Transition>> {
        let status = self.bridge.fetch_status().await?;
        Ok(self.process(&status).await)
    }

    /// Feed a snapshot to the monitor and record what it produced.
    pub async fn process(&self, status: &BleStatus) -> Option<Transition> {
        let now = self.clock.now();
        let transition = self.monitor.lock().await.on_snapshot_at(status, now);

        match &transition {
            Some(Transition::Attempt(attempt)) => {
                if self.record(attempt).await.is_ok() {
                    self.events.send(MonitorEvent::from_edge(attempt));
                }
            }
            Some(Transition::Dropped(edge)) => {
                self.events.send(MonitorEvent::AttemptDropped { edge: *edge });
            }
            None => debug!("No connection change"),
        }

        transition
    }

    /// Ask the bridge to connect to `device`.
    ///
    /// On success the device becomes the monitor's last known device; the
    /// connection itself is picked up by a later poll. On failure a
    /// "Connection failed" attempt is recorded and the error is returned. If
    /// the sink refuses that attempt the result is [`Error::Record`].
    pub async fn connect(&self, device: &DeviceIdentity) -> Result<()> {
        info!("Connecting to {}", device);

        match self
            .bridge
            .connect_device(device, self.config.connect_attempts)
            .await
        {
            Ok(()) => {
                self.monitor.lock().await.on_connect_requested(device);
                Ok(())
            }
            Err(e) => {
                let attempt = self
                    .monitor
                    .lock()
                    .await
                    .on_connect_failed(device, self.clock.now());
                let recorded = self.record(&attempt).await;
                self.events.send(MonitorEvent::ConnectFailed {
                    device: device.clone(),
                    error: e.to_string(),
                    at: attempt.at,
                });
                match recorded {
                    Ok(()) => Err(e),
                    Err(source) => Err(Error::Record {
                        connect: Box::new(e),
                        source: Box::new(source),
                    }),
                }
            }
        }
    }

    /// Record into the sink; persistence errors are logged and broadcast.
    async fn record(&self, attempt: &ConnectionAttempt) -> std::result::Result<(), S::Error> {
        let result = self.sink.lock().await.record_attempt(attempt);
        if let Err(e) = &result {
            error!("Failed to record attempt for {}: {}", attempt.device, e);
            self.events.send(MonitorEvent::RecordFailed {
                device: attempt.device.clone(),
                error: e.to_string(),
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBridge;
    use shiftlight_types::{REASON_CONNECTION_FAILED, REASON_DISCONNECTED};

    fn obd() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB", "OBD1")
    }

    type TestPoller = Poller<MockBridge, Vec<ConnectionAttempt>>;

    fn poller(bridge: &MockBridge) -> Arc<TestPoller> {
        let sink = Arc::new(Mutex::new(Vec::new()));
        Arc::new(Poller::new(bridge.clone(), sink, PollerConfig::default()).unwrap())
    }

    fn spawn_run(poller: &Arc<TestPoller>) -> (CancellationToken, tokio::task::JoinHandle<()>) {
        let cancel = CancellationToken::new();
        let p = Arc::clone(poller);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { p.run(token).await });
        (cancel, handle)
    }

    async fn recorded(poller: &TestPoller) -> Vec<ConnectionAttempt> {
        poller.sink().lock().await.clone()
    }

    #[test]
    fn test_config_validation() {
        assert!(PollerConfig::default().validate().is_ok());
        assert!(PollerConfig::new().interval(Duration::ZERO).validate().is_err());
        assert!(PollerConfig::new().connect_attempts(0).validate().is_err());
        assert!(PollerConfig::new().event_capacity(0).validate().is_err());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let sink = Arc::new(Mutex::new(Vec::<ConnectionAttempt>::new()));
        let result = Poller::new(MockBridge::new(), sink, PollerConfig::new().interval_secs(0));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_records_session() {
        let bridge = MockBridge::builder()
            .statuses([
                BleStatus::disconnected(),
                BleStatus::connected_to(obd()),
                BleStatus::new(true, None),
                BleStatus::disconnected(),
            ])
            .build();
        let poller = poller(&bridge);
        let mut events = poller.subscribe();
        let (cancel, handle) = spawn_run(&poller);

        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::Connected { .. }
        ));
        match events.recv().await.unwrap() {
            MonitorEvent::Disconnected { duration_ms, .. } => {
                // Snapshots 2 and 4 are two intervals apart
                assert_eq!(duration_ms, Some(6000));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        cancel.cancel();
        handle.await.unwrap();

        let attempts = recorded(&poller).await;
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].success);
        assert_eq!(attempts[1].reason.as_deref(), Some(REASON_DISCONNECTED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_are_skipped_ticks() {
        let bridge = MockBridge::builder()
            .statuses([BleStatus::connected_to(obd())])
            .failure("timeout")
            .failure("timeout")
            .statuses([BleStatus::new(true, Some(obd()))])
            .build();
        let poller = poller(&bridge);
        let mut events = poller.subscribe();
        let (cancel, handle) = spawn_run(&poller);

        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::Connected { .. }
        ));
        for expected in 1..=2 {
            match events.recv().await.unwrap() {
                MonitorEvent::PollFailed {
                    consecutive_failures,
                    ..
                } => assert_eq!(consecutive_failures, expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();
        handle.await.unwrap();

        // Errors never count as a disconnect
        let attempts = recorded(&poller).await;
        assert_eq!(attempts.len(), 1);
        assert!(poller.monitor().await.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_skips_ticks() {
        let bridge = MockBridge::builder()
            .status_latency(Duration::from_secs(7))
            .build();
        let poller = poller(&bridge);
        let (cancel, handle) = spawn_run(&poller);

        tokio::time::sleep(Duration::from_secs(20)).await;
        cancel.cancel();
        handle.await.unwrap();

        // Fetches never overlap: three started in 20 s instead of seven
        assert_eq!(bridge.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resumes_monitor_state() {
        let bridge = MockBridge::builder()
            .statuses([BleStatus::connected_to(obd())])
            .build();
        let poller = poller(&bridge);

        let (cancel, handle) = spawn_run(&poller);
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(poller.monitor().await.is_connected());

        bridge.set_status(BleStatus::disconnected()).await;
        let (cancel, handle) = spawn_run(&poller);
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        handle.await.unwrap();

        let attempts = recorded(&poller).await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].device, obd());
        assert_eq!(attempts[1].duration_ms, Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_promptly() {
        let bridge = MockBridge::builder()
            .status_latency(Duration::from_secs(60))
            .build();
        let poller = poller(&bridge);
        let (cancel, handle) = spawn_run(&poller);

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(bridge.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_recorded() {
        let bridge = MockBridge::builder().fail_connect(true).build();
        let poller = poller(&bridge);
        let mut events = poller.subscribe();

        let result = poller.connect(&obd()).await;
        assert!(matches!(result, Err(Error::ConnectFailed(_))));

        let attempts = recorded(&poller).await;
        assert_eq!(attempts.len(), 1);
        assert!(!attempts[0].success);
        assert_eq!(attempts[0].duration_ms, None);
        assert_eq!(attempts[0].reason.as_deref(), Some(REASON_CONNECTION_FAILED));
        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::ConnectFailed { .. }
        ));

        let requests = bridge.connect_requests().await;
        assert_eq!(requests, vec![(obd(), DEFAULT_CONNECT_ATTEMPTS)]);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    struct FullSink;

    impl AttemptSink for FullSink {
        type Error = DiskFull;

        fn record_attempt(&mut self, _: &ConnectionAttempt) -> std::result::Result<(), DiskFull> {
            Err(DiskFull)
        }
    }

    #[tokio::test]
    async fn test_connect_failure_reports_unsaved_attempt() {
        let bridge = MockBridge::builder().fail_connect(true).build();
        let sink = Arc::new(Mutex::new(FullSink));
        let poller = Poller::new(bridge, sink, PollerConfig::default()).unwrap();
        let mut events = poller.subscribe();

        match poller.connect(&obd()).await {
            Err(Error::Record { connect, source }) => {
                assert!(matches!(*connect, Error::ConnectFailed(_)));
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::RecordFailed { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::ConnectFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_connect_success_attributes_next_edge() {
        let bridge = MockBridge::new();
        let poller = poller(&bridge);

        poller.connect(&obd()).await.unwrap();
        assert_eq!(poller.monitor().await.last_known_device(), Some(&obd()));
        assert!(recorded(&poller).await.is_empty());

        // Bridge reports the connection without naming the device
        let transition = poller.process(&BleStatus::new(true, None)).await;
        let attempt = transition.unwrap().attempt().cloned().unwrap();
        assert_eq!(attempt.device, obd());
        assert!(attempt.success);
    }

    #[tokio::test]
    async fn test_dropped_edge_emits_event() {
        let bridge = MockBridge::new();
        let poller = poller(&bridge);
        let mut events = poller.subscribe();

        poller.process(&BleStatus::new(true, None)).await;

        assert!(matches!(
            events.recv().await.unwrap(),
            MonitorEvent::AttemptDropped { .. }
        ));
        assert!(recorded(&poller).await.is_empty());
        assert_eq!(poller.monitor().await.dropped_attempts(), 1);
    }

    #[tokio::test]
    async fn test_poll_once_propagates_fetch_error() {
        let bridge = MockBridge::new();
        bridge.set_fail_status(true);
        let poller = poller(&bridge);

        assert!(poller.poll_once().await.is_err());
        assert!(recorded(&poller).await.is_empty());
    }
}
