use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::fan_out::JitterFanOut;
use crate::geocoding::LocalityTable;
use crate::normalizer::{canonicalize_fuel_type, parse_price};
use crate::records::{FuelPriceRecord, RawPriceRow};

/// Produces a complete record set or fails as a whole.
#[async_trait]
pub trait PriceExtractor: Send + Sync {
    async fn extract(&self) -> AppResult<Vec<FuelPriceRecord>>;
}

/// Fetches the rendered upstream listing page.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self) -> AppResult<String>;
}

pub struct HttpListingSource {
    url: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpListingSource {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            url: config.upstream_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.extraction_timeout(),
        }
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch_listing(&self) -> AppResult<String> {
        // A fresh client per call: no cookies or pooled connections outlive
        // one extraction.
        let http = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .build()?;

        let response = http.get(&self.url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(url = %self.url, bytes = body.len(), "fetched listing page");
        Ok(body)
    }
}

pub struct ListingExtractor {
    source: Arc<dyn ListingSource>,
    row_selector: String,
    localities: LocalityTable,
    fan_out: JitterFanOut,
}

impl ListingExtractor {
    pub fn new(
        source: Arc<dyn ListingSource>,
        row_selector: impl Into<String>,
        localities: LocalityTable,
        fan_out: JitterFanOut,
    ) -> AppResult<Self> {
        let row_selector = row_selector.into();
        compile_selector(&row_selector)?;
        Ok(Self {
            source,
            row_selector,
            localities,
            fan_out,
        })
    }

    pub fn from_config(config: &AppConfig, localities: LocalityTable) -> AppResult<Self> {
        Self::new(
            Arc::new(HttpListingSource::new(config)),
            config.row_selector.clone(),
            localities,
            JitterFanOut::new(config.price_jitter),
        )
    }

    /// Turns scraped rows into records. Record ids are lower-cased, so a row
    /// whose fuel label matches an earlier one ignoring case is skipped.
    pub fn build_records(
        &self,
        rows: &[RawPriceRow],
        updated_at: DateTime<Utc>,
    ) -> AppResult<Vec<FuelPriceRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(rows.len() * self.localities.len());
        for row in rows {
            let fuel_type = canonicalize_fuel_type(&row.label);
            let base_price = parse_price(&row.price_text)?;
            if !seen.insert(fuel_type.as_str().to_lowercase()) {
                debug!(label = %row.label, %fuel_type, "skipping duplicate fuel type row");
                continue;
            }
            records.extend(
                self.fan_out
                    .fan_out(&fuel_type, base_price, &self.localities, updated_at),
            );
        }
        Ok(records)
    }
}

#[async_trait]
impl PriceExtractor for ListingExtractor {
    async fn extract(&self) -> AppResult<Vec<FuelPriceRecord>> {
        let html = self.source.fetch_listing().await?;
        let rows = parse_price_rows(&html, &self.row_selector)?;
        let records = self.build_records(&rows, Utc::now())?;
        info!(
            rows = rows.len(),
            records = records.len(),
            "extracted fuel prices"
        );
        Ok(records)
    }
}

/// Reads the first two cells of every matched row. Rows with fewer cells or
/// blank text are skipped; a page with no usable rows is a shape mismatch.
pub fn parse_price_rows(html: &str, row_selector: &str) -> AppResult<Vec<RawPriceRow>> {
    let rows_selector = compile_selector(row_selector)?;
    let cell_selector = compile_selector("td")?;
    let document = Html::parse_document(html);

    let mut matched = 0;
    let mut rows = Vec::new();
    for row in document.select(&rows_selector) {
        matched += 1;
        let cells = row
            .select(&cell_selector)
            .take(2)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect::<Vec<_>>();
        let [label, price_text] = cells.as_slice() else {
            continue;
        };
        if label.is_empty() || price_text.is_empty() {
            continue;
        }
        rows.push(RawPriceRow::new(label.as_str(), price_text.as_str()));
    }

    if matched == 0 {
        return Err(AppError::Extraction(format!(
            "no rows matched {row_selector:?}; listing layout changed?"
        )));
    }
    if rows.is_empty() {
        return Err(AppError::Extraction(format!(
            "{matched} rows matched {row_selector:?} but none held a label and a price"
        )));
    }
    Ok(rows)
}

fn compile_selector(selector: &str) -> AppResult<Selector> {
    Selector::parse(selector)
        .map_err(|err| AppError::Config(format!("invalid CSS selector {selector:?}: {err}")))
}
