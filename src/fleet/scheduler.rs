use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Initial,
    Interval,
    Manual,
}

/// Emits refresh events: one immediately, then one per period, plus one per
/// manual trigger. Stops for good once cancelled.
pub struct RefreshScheduler {
    ticker: Interval,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
    started: bool,
}

impl RefreshScheduler {
    pub fn new(period: Duration, cancel: CancellationToken, trigger: Arc<Notify>) -> Self {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            trigger,
            cancel,
            started: false,
        }
    }

    pub async fn next(&mut self) -> Option<RefreshReason> {
        if self.cancel.is_cancelled() {
            return None;
        }
        if !self.started {
            self.started = true;
            // the first tick of an interval completes immediately
            self.ticker.tick().await;
            return Some(RefreshReason::Initial);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = self.trigger.notified() => {
                self.ticker.reset();
                Some(RefreshReason::Manual)
            }
            _ = self.ticker.tick() => Some(RefreshReason::Interval),
        }
    }
}
