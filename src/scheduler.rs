use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::MAX_INTERVAL_SECS;
use crate::refresh::{RefreshTrigger, Refresher};

/// Runs one extraction at startup, then one at every wall-clock multiple of
/// `period` (UTC), regardless of read traffic.
pub struct RefreshScheduler {
    refresher: Refresher,
    period: StdDuration,
}

impl RefreshScheduler {
    pub fn new(refresher: Refresher, period: StdDuration) -> Self {
        Self {
            refresher,
            period: period.clamp(
                StdDuration::from_secs(1),
                StdDuration::from_secs(MAX_INTERVAL_SECS),
            ),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        info!(period_secs = self.period.as_secs(), "refresh scheduler started");
        if let Err(err) = self.refresher.refresh(RefreshTrigger::Startup).await {
            debug!(kind = err.kind(), "startup refresh failed; waiting for first tick");
        }

        let period = Duration::seconds(self.period.as_secs() as i64);
        loop {
            let now = Utc::now();
            let next = next_tick_after(now, period);
            debug!(%next, "next scheduled fuel price refresh");
            sleep((next - now).to_std().unwrap_or(self.period)).await;
            if let Err(err) = self.refresher.refresh(RefreshTrigger::Scheduled).await {
                debug!(kind = err.kind(), %next, "scheduled refresh failed; next tick retries");
            }
        }
    }
}

/// The first instant strictly after `now` that is a whole multiple of
/// `period` since the Unix epoch.
pub fn next_tick_after(now: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    let period_secs = period.num_seconds().max(1);
    let next = (now.timestamp().div_euclid(period_secs) + 1) * period_secs;
    DateTime::from_timestamp(next, 0).unwrap_or(now + period)
}
