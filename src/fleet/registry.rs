use crate::config::PollConfig;
use crate::fleet::FleetPoller;
use crate::session::{MemoryStorage, SessionStore};
use crate::telemetry::FleetApi;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Entry<A> {
    touched: Instant,
    poller: Arc<FleetPoller<A>>,
}

/// One poller per session token, evicted after it has not been accessed for
/// the idle window.
pub struct PollerRegistry<A> {
    api: Arc<A>,
    config: PollConfig,
    map: Arc<DashMap<String, Entry<A>>>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
    sweeping: Arc<AtomicBool>,
}

impl<A: FleetApi> PollerRegistry<A> {
    pub fn new(api: Arc<A>, config: PollConfig) -> Self {
        Self {
            api,
            config,
            map: Arc::new(DashMap::new()),
            sweeper: Mutex::new(None),
            sweeping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Returns the poller for `token`, starting one when none exists.
    pub fn get_or_start(&self, token: &str) -> Arc<FleetPoller<A>> {
        let poller = {
            let mut entry = self.map.entry(token.to_string()).or_insert_with(|| {
                tracing::debug!("starting poller for a new session");
                let session =
                    SessionStore::new(MemoryStorage::with_token(token), MemoryStorage::default());
                let poller = FleetPoller::new(self.api.clone(), session, self.config.clone());
                poller.start();
                Entry {
                    touched: Instant::now(),
                    poller,
                }
            });
            entry.touched = Instant::now();
            entry.poller.clone()
        };
        self.start_sweeper();
        poller
    }

    pub fn get(&self, token: &str) -> Option<Arc<FleetPoller<A>>> {
        let mut entry = self.map.get_mut(token)?;
        entry.touched = Instant::now();
        Some(entry.poller.clone())
    }

    /// Removes and stops the poller for `token`.
    pub fn remove(&self, token: &str) -> Option<Arc<FleetPoller<A>>> {
        let (_, entry) = self.map.remove(token)?;
        entry.poller.stop();
        if self.map.is_empty() {
            if let Some(task) = self.sweeper.lock().unwrap().take() {
                task.abort();
            }
            self.sweeping.store(false, Ordering::Release);
        }
        Some(entry.poller)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Stops every poller.
    pub fn shutdown(&self) {
        self.map.retain(|_, entry| {
            entry.poller.stop();
            false
        });
        if let Some(task) = self.sweeper.lock().unwrap().take() {
            task.abort();
        }
        self.sweeping.store(false, Ordering::Release);
    }

    fn start_sweeper(&self) {
        if self.sweeping.swap(true, Ordering::AcqRel) {
            return;
        }
        let sweeping = self.sweeping.clone();
        let idle = self.config.idle_evict();
        let map = self.map.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_period(idle)).await;
                let previous_len = map.len();
                if previous_len == 0 {
                    if release_sweeper(&map, &sweeping) {
                        break;
                    }
                    continue;
                }
                let now = Instant::now();
                map.retain(|_, entry| {
                    let keep = now.duration_since(entry.touched) < idle;
                    if !keep {
                        entry.poller.stop();
                    }
                    keep
                });
                let current_len = map.len();
                tracing::debug!(
                    before = previous_len,
                    after = current_len,
                    "evicted {} idle pollers",
                    previous_len - current_len
                );
                if current_len == 0 && release_sweeper(&map, &sweeping) {
                    break;
                }
            }
        });
        *self.sweeper.lock().unwrap() = Some(handle);
    }
}

/// Clears the running flag of a sweeper that found `map` empty. Returns
/// `false` when the sweeper has to keep going: an entry arrived after the
/// check and its `get_or_start` saw the flag still set.
fn release_sweeper<V>(map: &DashMap<String, V>, sweeping: &AtomicBool) -> bool {
    sweeping.store(false, Ordering::Release);
    map.is_empty() || sweeping.swap(true, Ordering::AcqRel)
}

fn sweep_period(idle: Duration) -> Duration {
    (idle / 2).max(Duration::from_secs(1))
}

impl<A> Drop for PollerRegistry<A> {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.lock().unwrap().take() {
            task.abort();
        }
    }
}
