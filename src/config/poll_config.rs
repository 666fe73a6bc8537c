use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub stale_after_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub idle_evict_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            stale_after_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            idle_evict_secs: 300,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
    pub fn idle_evict(&self) -> Duration {
        Duration::from_secs(self.idle_evict_secs)
    }
    /// Wait before retry number `attempt` (1-based): doubled each time, capped at 30s.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
            .min(Duration::from_secs(30))
    }
}
