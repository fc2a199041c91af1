use std::sync::Arc;

use axum::extract::State;
use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::PublicAppConfig;
use crate::records::FuelPriceRecord;
use crate::refresh::RefreshStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub record_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub stale: bool,
    pub locality_count: usize,
    pub refresh: RefreshStatus,
    pub config: PublicAppConfig,
}

impl ServiceHealth {
    pub fn new(
        record_count: usize,
        last_updated: Option<DateTime<Utc>>,
        stale: bool,
        locality_count: usize,
        refresh: RefreshStatus,
        config: PublicAppConfig,
    ) -> Self {
        Self {
            record_count,
            last_updated,
            stale,
            locality_count,
            refresh,
            config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/fuel-prices", get(fuel_prices))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// GET /api/fuel-prices
pub async fn fuel_prices(State(state): State<Arc<AppState>>) -> Json<Vec<FuelPriceRecord>> {
    Json(state.query().get_prices().await)
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ServiceHealth> {
    Json(state.health())
}
