mod cache;
mod commands;
mod config;
mod errors;
mod extractor;
mod fan_out;
mod geocoding;
mod normalizer;
mod query;
mod records;
mod refresh;
mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::OnceCell;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::cache::{CacheSnapshot, PriceCache};
pub use crate::commands::{router, ServiceHealth};
pub use crate::config::{AppConfig, PublicAppConfig};
pub use crate::errors::{AppError, AppResult};
pub use crate::extractor::{
    parse_price_rows, HttpListingSource, ListingExtractor, ListingSource, PriceExtractor,
};
pub use crate::fan_out::JitterFanOut;
pub use crate::geocoding::{Coordinates, Locality, LocalityTable};
pub use crate::normalizer::{canonicalize_fuel_type, parse_price, FuelType};
pub use crate::query::PriceQueryService;
pub use crate::records::{FuelPriceRecord, RawPriceRow};
pub use crate::refresh::{RefreshOutcome, RefreshStatus, RefreshTrigger, Refresher};
pub use crate::scheduler::{next_tick_after, RefreshScheduler};

pub struct AppState {
    config: AppConfig,
    query: PriceQueryService,
    locality_count: usize,
}

impl AppState {
    /// Wires the live upstream extractor from `config`.
    pub fn initialize(config: AppConfig) -> AppResult<Self> {
        let localities = match &config.localities_file {
            Some(path) => LocalityTable::from_csv_path(path)?,
            None => LocalityTable::belgium(),
        };
        info!(
            localities = localities.len(),
            upstream = %config.upstream_url,
            "initializing fuel price service"
        );
        let locality_count = localities.len();
        let extractor = ListingExtractor::from_config(&config, localities)?;
        Ok(Self::with_extractor(config, Arc::new(extractor), locality_count))
    }

    pub fn with_extractor(
        config: AppConfig,
        extractor: Arc<dyn PriceExtractor>,
        locality_count: usize,
    ) -> Self {
        let refresher = Refresher::new(extractor, PriceCache::new(), config.extraction_timeout());
        let query = PriceQueryService::new(refresher, config.stale_after());
        Self {
            config,
            query,
            locality_count,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn query(&self) -> &PriceQueryService {
        &self.query
    }

    pub fn refresher(&self) -> &Refresher {
        self.query.refresher()
    }

    /// Starts the periodic refresh task unless it is disabled in config.
    pub fn start_scheduler(&self) -> Option<JoinHandle<()>> {
        if !self.config.scheduler_enabled {
            info!("refresh scheduler disabled; cache fills on first read");
            return None;
        }
        let scheduler =
            RefreshScheduler::new(self.refresher().clone(), self.config.refresh_interval());
        Some(scheduler.spawn())
    }

    pub fn health(&self) -> ServiceHealth {
        let snapshot = self.query.peek();
        ServiceHealth::new(
            snapshot.records.len(),
            snapshot.last_updated,
            snapshot.is_stale(Utc::now(), self.query.stale_after()),
            self.locality_count,
            self.refresher().status(),
            self.config.public_profile(),
        )
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,fuel_price_service=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

/// Serves the read endpoint until ctrl-c or SIGTERM.
pub async fn run(config: AppConfig) -> AppResult<()> {
    let bind_address = config.bind_address;
    let state = Arc::new(AppState::initialize(config)?);
    let scheduler = state.start_scheduler();

    let listener = TcpListener::bind(bind_address).await?;
    info!(address = %listener.local_addr()?, "fuel price API listening");

    let served = axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    served?;
    info!("fuel price API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
