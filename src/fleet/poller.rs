use crate::config::PollConfig;
use crate::errors::{FailureClass, FleetError};
use crate::fleet::reconcile;
use crate::fleet::scheduler::{RefreshReason, RefreshScheduler};
use crate::models::fleet::DeviceLocation;
use crate::session::SessionStore;
use crate::telemetry::FleetApi;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Error => "error",
        }
    }
}

/// Result of one successful poll cycle. Never mutated; replaced wholesale.
#[derive(Debug)]
pub struct FleetSnapshot {
    pub locations: Vec<DeviceLocation>,
    pub fetched_at: DateTime<Utc>,
    pub generation: u64,
    received: Instant,
}

impl FleetSnapshot {
    fn new(locations: Vec<DeviceLocation>, generation: u64) -> Self {
        Self {
            locations,
            fetched_at: Utc::now(),
            generation,
            received: Instant::now(),
        }
    }
    pub fn age(&self) -> std::time::Duration {
        self.received.elapsed()
    }
}

/// What observers see. The phase is `Loading` whenever a cycle is in flight,
/// but the last good snapshot stays available for display meanwhile.
#[derive(Debug, Clone, Default)]
pub struct FleetStatus {
    pub snapshot: Option<Arc<FleetSnapshot>>,
    pub failure: Option<FailureClass>,
    in_flight: usize,
    applied: u64,
}

impl FleetStatus {
    pub fn phase(&self) -> Phase {
        if self.in_flight > 0 {
            Phase::Loading
        } else if self.failure.is_some() {
            Phase::Error
        } else if self.snapshot.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }
    /// A refresh is running behind a snapshot that is still displayed.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight > 0 && self.snapshot.is_some()
    }
}

/// Polls the upstream service for one session and publishes the reconciled
/// fleet through a watch channel.
pub struct FleetPoller<A> {
    api: Arc<A>,
    session: SessionStore,
    config: PollConfig,
    status: watch::Sender<FleetStatus>,
    issued: AtomicU64,
    redirect_armed: AtomicBool,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
}

impl<A: FleetApi> FleetPoller<A> {
    pub fn new(api: Arc<A>, session: SessionStore, config: PollConfig) -> Arc<Self> {
        let (status, _) = watch::channel(FleetStatus::default());
        Arc::new(Self {
            api,
            session,
            config,
            status,
            issued: AtomicU64::new(0),
            redirect_armed: AtomicBool::new(false),
            trigger: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Starts the refresh loop. The loop only holds a weak reference, so
    /// dropping the last handle to the poller stops it.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut scheduler = RefreshScheduler::new(
            self.config.interval(),
            self.cancel.clone(),
            self.trigger.clone(),
        );
        // observers see the first load as in flight right away
        let mut initial = Some(self.begin_cycle(RefreshReason::Initial));
        tokio::spawn(async move {
            while let Some(reason) = scheduler.next().await {
                let Some(poller) = weak.upgrade() else {
                    break;
                };
                let generation = match (reason, initial.take()) {
                    (RefreshReason::Initial, Some(generation)) => generation,
                    (_, _) => poller.begin_cycle(reason),
                };
                tokio::spawn(async move {
                    poller.run_cycle(generation).await;
                });
            }
            if let (Some(_), Some(poller)) = (initial, weak.upgrade()) {
                poller.status.send_modify(|status| status.in_flight -= 1);
            }
            tracing::debug!("poll loop stopped");
        })
    }

    pub fn refresh(&self) {
        self.trigger.notify_one();
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self) -> FleetStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FleetStatus> {
        self.status.subscribe()
    }

    /// True when the displayed snapshot is older than the staleness window.
    pub fn is_stale(&self) -> bool {
        let status = self.status.borrow();
        match &status.snapshot {
            Some(snapshot) => status.in_flight == 0 && snapshot.age() >= self.config.stale_after(),
            None => false,
        }
    }

    /// Returns true exactly once per transition into the error state.
    pub fn take_redirect(&self) -> bool {
        self.redirect_armed.swap(false, Ordering::AcqRel)
    }

    fn begin_cycle(&self, reason: RefreshReason) -> u64 {
        let generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
        self.status.send_modify(|status| status.in_flight += 1);
        tracing::debug!(generation, ?reason, "poll cycle started");
        generation
    }

    /// Runs one cycle inline, retries included.
    pub async fn refresh_now(&self) {
        let generation = self.begin_cycle(RefreshReason::Manual);
        self.run_cycle(generation).await;
    }

    async fn run_cycle(&self, generation: u64) {
        let result = self.fetch_with_retry().await;
        self.finish(generation, result);
    }

    async fn fetch_with_retry(&self) -> Result<Vec<DeviceLocation>, FleetError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once().await {
                Ok(locations) => return Ok(locations),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    tracing::warn!(
                        reason = %err,
                        attempt,
                        delay = %format!("{}ms", delay.as_millis()),
                        "fleet fetch failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(err),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self) -> Result<Vec<DeviceLocation>, FleetError> {
        let token = self
            .session
            .get_token()
            .ok_or(FleetError::MissingCredentials)?;
        self.api.validate_session(&token).await?;
        let (devices, positions) = tokio::try_join!(
            self.api.fetch_devices(&token),
            self.api.fetch_positions(&token)
        )?;
        Ok(reconcile::reconcile(&devices, &positions))
    }

    fn finish(&self, generation: u64, result: Result<Vec<DeviceLocation>, FleetError>) {
        let mut entered_error = None;
        self.status.send_modify(|status| {
            status.in_flight -= 1;
            if generation < status.applied {
                tracing::debug!(
                    generation,
                    applied = status.applied,
                    "discarding response overtaken by a newer cycle"
                );
                return;
            }
            status.applied = generation;
            match result {
                Ok(locations) => {
                    tracing::debug!(generation, vehicles = locations.len(), "poll cycle finished");
                    status.snapshot = Some(Arc::new(FleetSnapshot::new(locations, generation)));
                    status.failure = None;
                }
                Err(err) => {
                    let class = err.class();
                    if status.failure.is_none() {
                        entered_error = Some(err);
                    } else {
                        tracing::debug!(reason = %err, generation, "fleet data still unavailable");
                    }
                    status.failure = Some(class);
                }
            }
        });
        if let Some(err) = entered_error {
            tracing::error!(reason = %err, generation, "fleet data unavailable, ending session");
            self.session.clear_token();
            self.redirect_armed.store(true, Ordering::Release);
            self.cancel.cancel();
        }
    }
}

impl<A> Drop for FleetPoller<A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fleet::{Device, Position, SessionInfo};
    use crate::session::{MemoryStorage, TokenStorage};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct MockApi {
        session_valid: bool,
        transient_failures: AtomicU32,
        validations: AtomicU32,
        device_calls: AtomicU32,
        validate_delays: Mutex<VecDeque<Duration>>,
        device_batches: Mutex<VecDeque<Vec<Device>>>,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                session_valid: true,
                transient_failures: AtomicU32::new(0),
                validations: AtomicU32::new(0),
                device_calls: AtomicU32::new(0),
                validate_delays: Mutex::new(VecDeque::new()),
                device_batches: Mutex::new(VecDeque::new()),
            }
        }
        fn failing(times: u32) -> Self {
            let api = Self::new();
            api.transient_failures.store(times, Ordering::SeqCst);
            api
        }
    }

    fn device(id: i64, name: &str) -> Device {
        Device {
            id,
            name: Some(name.to_string()),
            status: Some("moving".to_string()),
            unique_id: None,
            category: None,
            last_update: None,
        }
    }

    impl FleetApi for MockApi {
        async fn validate_session(&self, _token: &str) -> Result<SessionInfo, FleetError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            let delay = self.validate_delays.lock().unwrap().pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if !self.session_valid {
                return Err(FleetError::SessionRejected);
            }
            Ok(SessionInfo {
                valid: true,
                user_id: Some(1),
                expires: None,
            })
        }

        async fn fetch_devices(&self, _token: &str) -> Result<Vec<Device>, FleetError> {
            self.device_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.transient_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(FleetError::Upstream {
                    status: 503,
                    detail: "busy".to_string(),
                });
            }
            let batch = self.device_batches.lock().unwrap().pop_front();
            Ok(batch.unwrap_or_else(|| vec![device(1, "Truck A"), device(2, "Truck B")]))
        }

        async fn fetch_positions(&self, _token: &str) -> Result<Vec<Position>, FleetError> {
            Ok(vec![Position {
                id: Some(1),
                device_id: 1,
                latitude: Some(10.0),
                longitude: Some(20.0),
                speed: Some(30.0),
                course: None,
                address: None,
                device_time: Some("2024-01-01T00:00:00Z".to_string()),
                fix_time: None,
            }])
        }
    }

    fn poller_with(api: MockApi, token: Option<&str>) -> (Arc<FleetPoller<MockApi>>, Arc<MockApi>, MemoryStorage) {
        let api = Arc::new(api);
        let storage = token
            .map(|token| MemoryStorage::with_token(token))
            .unwrap_or_default();
        let session = SessionStore::new(storage.clone(), MemoryStorage::default());
        let poller = FleetPoller::new(api.clone(), session, PollConfig::default());
        (poller, api, storage)
    }

    #[tokio::test(start_paused = true)]
    async fn missing_token_fails_without_network() {
        let (poller, api, _) = poller_with(MockApi::new(), None);
        poller.refresh_now().await;
        let status = poller.status();
        assert_eq!(status.phase(), Phase::Error);
        assert_eq!(status.failure, Some(FailureClass::MissingCredentials));
        assert_eq!(api.validations.load(Ordering::SeqCst), 0);
        assert!(poller.take_redirect());
        assert!(!poller.take_redirect());
        assert!(poller.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_cycle_publishes_reconciled_fleet() {
        let (poller, api, storage) = poller_with(MockApi::new(), Some("token"));
        assert_eq!(poller.status().phase(), Phase::Idle);
        poller.refresh_now().await;
        let status = poller.status();
        assert_eq!(status.phase(), Phase::Ready);
        let snapshot = status.snapshot.unwrap();
        assert_eq!(snapshot.generation, 1);
        // device 2 has no position
        assert_eq!(snapshot.locations.len(), 1);
        assert_eq!(snapshot.locations[0].device.id, 1);
        assert_eq!(api.validations.load(Ordering::SeqCst), 1);
        assert!(!poller.take_redirect());
        assert_eq!(storage.read().as_deref(), Some("token"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let (poller, api, _) = poller_with(MockApi::failing(2), Some("token"));
        poller.refresh_now().await;
        assert_eq!(poller.status().phase(), Phase::Ready);
        assert_eq!(api.device_calls.load(Ordering::SeqCst), 3);
        assert_eq!(api.validations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_ends_session_once() {
        let (poller, api, storage) = poller_with(MockApi::failing(100), Some("token"));
        poller.refresh_now().await;
        let status = poller.status();
        assert_eq!(status.phase(), Phase::Error);
        assert_eq!(status.failure, Some(FailureClass::Unavailable));
        // one attempt plus three retries
        assert_eq!(api.device_calls.load(Ordering::SeqCst), 4);
        assert_eq!(storage.read(), None);
        assert!(poller.take_redirect());
        poller.refresh_now().await;
        assert_eq!(poller.status().phase(), Phase::Error);
        assert!(!poller.take_redirect());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_session_is_not_retried() {
        let mut api = MockApi::new();
        api.session_valid = false;
        let (poller, api, _) = poller_with(api, Some("token"));
        poller.refresh_now().await;
        assert_eq!(poller.status().phase(), Phase::Error);
        assert_eq!(api.validations.load(Ordering::SeqCst), 1);
        assert_eq!(api.device_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_rearms_after_recovery() {
        let (poller, api, storage) = poller_with(MockApi::failing(4), Some("token"));
        poller.refresh_now().await;
        assert!(poller.take_redirect());
        storage.write("token");
        poller.refresh_now().await;
        assert_eq!(poller.status().phase(), Phase::Ready);
        api.transient_failures.store(100, Ordering::SeqCst);
        poller.refresh_now().await;
        assert_eq!(poller.status().phase(), Phase::Error);
        assert!(poller.take_redirect());
    }

    #[tokio::test(start_paused = true)]
    async fn overtaken_response_is_discarded() {
        let api = MockApi::new();
        api.validate_delays
            .lock()
            .unwrap()
            .push_back(Duration::from_millis(500));
        api.device_batches
            .lock()
            .unwrap()
            .extend([vec![device(1, "newer")], vec![device(1, "older")]]);
        let (poller, _, _) = poller_with(api, Some("token"));
        tokio::join!(poller.refresh_now(), poller.refresh_now());
        let status = poller.status();
        assert_eq!(status.phase(), Phase::Ready);
        let snapshot = status.snapshot.unwrap();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.locations[0].device.name.as_deref(), Some("newer"));
    }

    #[tokio::test(start_paused = true)]
    async fn previous_snapshot_stays_visible_during_refresh() {
        let (poller, api, _) = poller_with(MockApi::new(), Some("token"));
        poller.refresh_now().await;
        api.validate_delays
            .lock()
            .unwrap()
            .push_back(Duration::from_secs(1));
        let mut receiver = poller.subscribe();
        let background = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.refresh_now().await })
        };
        let status = receiver
            .wait_for(|status| status.phase() == Phase::Loading)
            .await
            .unwrap()
            .clone();
        assert!(status.is_refreshing());
        assert_eq!(status.snapshot.as_ref().unwrap().generation, 1);
        background.await.unwrap();
        assert_eq!(poller.status().snapshot.unwrap().generation, 2);
        assert!(!poller.status().is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_polls_on_interval_until_stopped() {
        let (poller, api, _) = poller_with(MockApi::new(), Some("token"));
        let handle = poller.start();
        let mut receiver = poller.subscribe();
        receiver
            .wait_for(|status| status.phase() == Phase::Ready)
            .await
            .unwrap();
        assert_eq!(api.validations.load(Ordering::SeqCst), 1);
        assert!(!poller.is_stale());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(poller.is_stale());
        receiver
            .wait_for(|status| status.snapshot.as_ref().map(|it| it.generation) == Some(2))
            .await
            .unwrap();
        assert_eq!(api.validations.load(Ordering::SeqCst), 2);
        poller.refresh();
        receiver
            .wait_for(|status| status.snapshot.as_ref().map(|it| it.generation) == Some(3))
            .await
            .unwrap();
        poller.stop();
        handle.await.unwrap();
    }
}
