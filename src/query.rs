use chrono::{Duration, Utc};
use tracing::debug;

use crate::cache::{CacheSnapshot, PriceCache};
use crate::records::FuelPriceRecord;
use crate::refresh::Refresher;

/// The read path. Stale reads refresh opportunistically; the caller always
/// gets the best records available, never an error.
#[derive(Clone)]
pub struct PriceQueryService {
    cache: PriceCache,
    refresher: Refresher,
    stale_after: Duration,
}

impl PriceQueryService {
    pub fn new(refresher: Refresher, stale_after: Duration) -> Self {
        Self {
            cache: refresher.cache().clone(),
            refresher,
            stale_after,
        }
    }

    pub async fn get_prices(&self) -> Vec<FuelPriceRecord> {
        let snapshot = self.cache.read();
        if snapshot.is_stale(Utc::now(), self.stale_after) {
            match self.refresher.refresh_if_stale(self.stale_after).await {
                Ok(outcome) => debug!(?outcome, "stale read refresh finished"),
                Err(err) => debug!(
                    error = %err,
                    cached = snapshot.records.len(),
                    "serving previous snapshot after failed refresh"
                ),
            }
        }
        self.cache.read().records.clone()
    }

    /// Current snapshot without triggering a refresh.
    pub fn peek(&self) -> std::sync::Arc<CacheSnapshot> {
        self.cache.read()
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }
}
