use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

use crate::cache::PriceCache;
use crate::errors::{AppError, AppResult};
use crate::extractor::PriceExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    StaleRead,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Startup => "startup",
            RefreshTrigger::Scheduled => "scheduled",
            RefreshTrigger::StaleRead => "stale_read",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This caller ran an extraction and wrote `n` records.
    Refreshed(usize),
    /// The snapshot was already fresh once the guard was acquired.
    AlreadyFresh,
    /// Another caller's extraction finished while this one waited.
    JoinedInFlight,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub attempts: u64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
    pub consecutive_failures: u32,
}

/// The one path that writes the cache. At most one extraction runs at a
/// time; callers arriving meanwhile wait for it.
#[derive(Clone)]
pub struct Refresher {
    extractor: Arc<dyn PriceExtractor>,
    cache: PriceCache,
    timeout: StdDuration,
    guard: Arc<AsyncMutex<()>>,
    status: Arc<Mutex<RefreshStatus>>,
}

impl Refresher {
    pub fn new(extractor: Arc<dyn PriceExtractor>, cache: PriceCache, timeout: StdDuration) -> Self {
        Self {
            extractor,
            cache,
            timeout,
            guard: Arc::new(AsyncMutex::new(())),
            status: Arc::new(Mutex::new(RefreshStatus::default())),
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.lock().clone()
    }

    /// Extracts unconditionally once the guard is free.
    pub async fn refresh(&self, trigger: RefreshTrigger) -> AppResult<usize> {
        let _lock = self.guard.lock().await;
        self.run_locked(trigger).await
    }

    /// Extracts only if the snapshot is still stale after waiting for any
    /// in-flight extraction. A waiter never starts a second attempt right
    /// behind one that just finished, successful or not.
    pub async fn refresh_if_stale(&self, ttl: Duration) -> AppResult<RefreshOutcome> {
        let seen_attempts = self.status.lock().attempts;
        let _lock = self.guard.lock().await;

        if self.status.lock().attempts != seen_attempts {
            return Ok(RefreshOutcome::JoinedInFlight);
        }
        if !self.cache.read().is_stale(Utc::now(), ttl) {
            return Ok(RefreshOutcome::AlreadyFresh);
        }
        self.run_locked(RefreshTrigger::StaleRead)
            .await
            .map(RefreshOutcome::Refreshed)
    }

    async fn run_locked(&self, trigger: RefreshTrigger) -> AppResult<usize> {
        let started = Instant::now();
        let result = match timeout(self.timeout, self.extractor.extract()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout)),
        };
        let finished_at = Utc::now();

        let mut status = self.status.lock();
        status.attempts += 1;
        status.last_attempt_at = Some(finished_at);
        match result {
            Ok(records) => {
                let count = records.len();
                self.cache.write_at(records, finished_at);
                status.last_success_at = Some(finished_at);
                status.last_failure = None;
                status.consecutive_failures = 0;
                info!(
                    trigger = trigger.as_str(),
                    count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "fuel price cache refreshed"
                );
                Ok(count)
            }
            Err(err) => {
                status.last_failure = Some(format!("{}: {err}", err.kind()));
                status.consecutive_failures += 1;
                warn!(
                    ?err,
                    trigger = trigger.as_str(),
                    consecutive_failures = status.consecutive_failures,
                    "fuel price extraction failed; keeping previous snapshot"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::geocoding::Coordinates;
    use crate::normalizer::FuelType;
    use crate::records::FuelPriceRecord;

    /// Replays queued results, then repeats the last one.
    pub(crate) struct ScriptedExtractor {
        script: Mutex<VecDeque<Result<Vec<FuelPriceRecord>, String>>>,
        delay: StdDuration,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        pub(crate) fn new(script: Vec<Result<Vec<FuelPriceRecord>, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                delay: StdDuration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_delay(mut self, delay: StdDuration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceExtractor for ScriptedExtractor {
        async fn extract(&self) -> AppResult<Vec<FuelPriceRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = {
                let mut script = self.script.lock();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                }
            };
            match next {
                Some(Ok(records)) => Ok(records),
                Some(Err(message)) => Err(AppError::Extraction(message)),
                None => Ok(Vec::new()),
            }
        }
    }

    pub(crate) fn sample_records(price: f64) -> Vec<FuelPriceRecord> {
        ["Gent", "Namur"]
            .iter()
            .map(|locality| {
                FuelPriceRecord::new(
                    locality,
                    FuelType::Diesel,
                    price,
                    Coordinates { lat: 50.5, lng: 4.5 },
                    Utc::now(),
                )
            })
            .collect()
    }

    fn refresher(extractor: Arc<ScriptedExtractor>) -> Refresher {
        Refresher::new(extractor, PriceCache::new(), StdDuration::from_secs(5))
    }

    #[tokio::test]
    async fn success_writes_cache_and_resets_failures() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Err("upstream down".into()),
            Ok(sample_records(1.6)),
        ]));
        let refresher = refresher(extractor.clone());

        assert!(refresher.refresh(RefreshTrigger::Startup).await.is_err());
        let status = refresher.status();
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_failure.unwrap().contains("upstream down"));
        assert!(refresher.cache().read().last_updated.is_none());

        assert_eq!(refresher.refresh(RefreshTrigger::Scheduled).await.unwrap(), 2);
        let status = refresher.status();
        assert_eq!(status.attempts, 2);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_failure.is_none());

        let snapshot = refresher.cache().read();
        assert_eq!(snapshot.records.len(), 2);
        assert!(snapshot.records.iter().all(|r| r.price == 1.6));
        assert_eq!(snapshot.last_updated, status.last_success_at);
    }

    #[tokio::test]
    async fn failure_keeps_previous_snapshot() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Ok(sample_records(1.5)),
            Err("boom".into()),
        ]));
        let refresher = refresher(extractor);

        refresher.refresh(RefreshTrigger::Startup).await.unwrap();
        let before = refresher.cache().read();
        assert!(refresher.refresh(RefreshTrigger::Scheduled).await.is_err());
        let after = refresher.cache().read();

        assert_eq!(before, after);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_extraction_times_out() {
        let extractor = Arc::new(
            ScriptedExtractor::new(vec![Ok(sample_records(1.5))])
                .with_delay(StdDuration::from_secs(60)),
        );
        let refresher = Refresher::new(extractor, PriceCache::new(), StdDuration::from_secs(30));

        let err = refresher.refresh(RefreshTrigger::StaleRead).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert!(refresher.cache().read().records.is_empty());
    }

    #[tokio::test]
    async fn fresh_snapshot_skips_extraction() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![Ok(sample_records(1.5))]));
        let refresher = refresher(extractor.clone());

        let first = refresher.refresh_if_stale(Duration::hours(6)).await.unwrap();
        let second = refresher.refresh_if_stale(Duration::hours(6)).await.unwrap();

        assert_eq!(first, RefreshOutcome::Refreshed(2));
        assert_eq!(second, RefreshOutcome::AlreadyFresh);
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_stale_callers_share_one_extraction() {
        let extractor = Arc::new(
            ScriptedExtractor::new(vec![Err("down".into())])
                .with_delay(StdDuration::from_millis(50)),
        );
        let refresher = refresher(extractor.clone());

        let (a, b) = tokio::join!(
            refresher.refresh_if_stale(Duration::hours(6)),
            refresher.refresh_if_stale(Duration::hours(6)),
        );

        assert!(a.is_err());
        assert_eq!(b.unwrap(), RefreshOutcome::JoinedInFlight);
        assert_eq!(extractor.calls(), 1);
    }
}
