use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_UPSTREAM_URL: &str = "https://carbu.com/belgie/maximumprijs";
pub const DEFAULT_ROW_SELECTOR: &str = ".price_summary table tr";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";
const SIX_HOURS_SECS: u64 = 6 * 60 * 60;
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRICE_JITTER: f64 = 0.05;
/// Upper bound for every interval setting: one hundred years.
pub const MAX_INTERVAL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub upstream_url: String,
    pub row_selector: String,
    pub bind_address: SocketAddr,
    pub refresh_interval_secs: u64,
    pub stale_after_secs: u64,
    pub extraction_timeout_secs: u64,
    pub price_jitter: f64,
    pub user_agent: String,
    pub localities_file: Option<PathBuf>,
    pub scheduler_enabled: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAppConfig {
    pub upstream_url: String,
    pub refresh_interval_secs: u64,
    pub stale_after_secs: u64,
    pub extraction_timeout_secs: u64,
    pub price_jitter: f64,
    pub has_custom_localities: bool,
    pub scheduler_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            row_selector: DEFAULT_ROW_SELECTOR.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3001))),
            refresh_interval_secs: SIX_HOURS_SECS,
            stale_after_secs: SIX_HOURS_SECS,
            extraction_timeout_secs: DEFAULT_EXTRACTION_TIMEOUT_SECS,
            price_jitter: DEFAULT_PRICE_JITTER,
            user_agent: default_user_agent(),
            localities_file: None,
            scheduler_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|err| AppError::Config(format!("invalid BIND_ADDRESS {value:?}: {err}")))?,
            Err(_) => defaults.bind_address,
        };

        Ok(Self {
            upstream_url: non_empty_var("FUEL_UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            row_selector: non_empty_var("FUEL_ROW_SELECTOR").unwrap_or(defaults.row_selector),
            bind_address,
            refresh_interval_secs: checked_interval(
                "REFRESH_INTERVAL_SECS",
                parse_u64("REFRESH_INTERVAL_SECS", SIX_HOURS_SECS),
            )?
            .max(1),
            stale_after_secs: checked_interval(
                "STALE_AFTER_SECS",
                parse_u64("STALE_AFTER_SECS", SIX_HOURS_SECS),
            )?,
            extraction_timeout_secs: checked_interval(
                "EXTRACTION_TIMEOUT_SECS",
                parse_u64("EXTRACTION_TIMEOUT_SECS", DEFAULT_EXTRACTION_TIMEOUT_SECS),
            )?
            .max(1),
            price_jitter: parse_f64("PRICE_JITTER", DEFAULT_PRICE_JITTER).abs(),
            user_agent: non_empty_var("HTTP_USER_AGENT").unwrap_or(defaults.user_agent),
            localities_file: non_empty_var("LOCALITIES_FILE").map(PathBuf::from),
            scheduler_enabled: parse_bool("SCHEDULER_ENABLED", true),
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs.min(MAX_INTERVAL_SECS) as i64)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            upstream_url: self.upstream_url.clone(),
            refresh_interval_secs: self.refresh_interval_secs,
            stale_after_secs: self.stale_after_secs,
            extraction_timeout_secs: self.extraction_timeout_secs,
            price_jitter: self.price_jitter,
            has_custom_localities: self.localities_file.is_some(),
            scheduler_enabled: self.scheduler_enabled,
        }
    }
}

fn default_user_agent() -> String {
    format!("fuel-price-service/{}", env!("CARGO_PKG_VERSION"))
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn checked_interval(key: &str, secs: u64) -> AppResult<u64> {
    if secs > MAX_INTERVAL_SECS {
        return Err(AppError::Config(format!(
            "{key}={secs} exceeds the maximum of {MAX_INTERVAL_SECS} seconds"
        )));
    }
    Ok(secs)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_six_hour_policy() {
        let config = AppConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(21_600));
        assert_eq!(config.stale_after(), chrono::Duration::hours(6));
        assert_eq!(config.extraction_timeout(), Duration::from_secs(30));
        assert_eq!(config.bind_address.port(), 3001);
        assert!(config.user_agent.starts_with("fuel-price-service/"));
    }

    #[test]
    fn rejects_out_of_range_intervals() {
        let err = checked_interval("STALE_AFTER_SECS", 100_000_000_000_000_000).unwrap_err();
        assert!(matches!(err, AppError::Config(ref message) if message.contains("STALE_AFTER_SECS")));
        assert_eq!(
            checked_interval("REFRESH_INTERVAL_SECS", MAX_INTERVAL_SECS).unwrap(),
            MAX_INTERVAL_SECS
        );
    }

    #[test]
    fn oversized_fields_do_not_panic_when_converted() {
        let config = AppConfig {
            stale_after_secs: u64::MAX,
            refresh_interval_secs: u64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(
            config.stale_after(),
            chrono::Duration::seconds(MAX_INTERVAL_SECS as i64)
        );
    }

    #[test]
    fn reads_overrides_from_env() {
        env::set_var("FUEL_UPSTREAM_URL", "http://localhost:9999/prices");
        env::set_var("STALE_AFTER_SECS", "60");
        env::set_var("PRICE_JITTER", "-0.02");
        env::set_var("LOCALITIES_FILE", "  ");
        env::set_var("SCHEDULER_ENABLED", "false");

        let config = AppConfig::from_env().unwrap();
        let public = config.public_profile();

        assert_eq!(public.upstream_url, "http://localhost:9999/prices");
        assert_eq!(public.stale_after_secs, 60);
        assert!((public.price_jitter - 0.02).abs() < f64::EPSILON);
        assert!(!public.has_custom_localities);
        assert!(!public.scheduler_enabled);

        for key in [
            "FUEL_UPSTREAM_URL",
            "STALE_AFTER_SECS",
            "PRICE_JITTER",
            "LOCALITIES_FILE",
            "SCHEDULER_ENABLED",
        ] {
            env::remove_var(key);
        }
    }
}
