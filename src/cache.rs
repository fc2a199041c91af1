use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::trace;

use crate::records::FuelPriceRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub records: Vec<FuelPriceRecord>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CacheSnapshot {
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        is_stale(self, now, ttl)
    }
}

/// A snapshot that was never written is stale; otherwise it goes stale once
/// its age reaches `ttl`.
pub fn is_stale(snapshot: &CacheSnapshot, now: DateTime<Utc>, ttl: Duration) -> bool {
    match snapshot.last_updated {
        None => true,
        Some(updated) => now - updated >= ttl,
    }
}

/// Shared handle to the latest extracted record set. Clones share state.
#[derive(Clone, Default)]
pub struct PriceCache {
    current: Arc<RwLock<Arc<CacheSnapshot>>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> Arc<CacheSnapshot> {
        let guard = self.current.read();
        Arc::clone(&*guard)
    }

    pub fn write(&self, records: Vec<FuelPriceRecord>) {
        self.write_at(records, Utc::now());
    }

    /// Replaces the whole snapshot. The new list is built before the lock is
    /// taken, so readers see either the old or the new set.
    pub fn write_at(&self, records: Vec<FuelPriceRecord>, updated_at: DateTime<Utc>) {
        let snapshot = Arc::new(CacheSnapshot {
            records,
            last_updated: Some(updated_at),
        });
        let count = snapshot.records.len();
        *self.current.write() = snapshot;
        trace!(count, %updated_at, "price cache replaced");
    }
}
