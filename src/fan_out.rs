//! Per-locality price simulation.
//!
//! Upstream publishes one national maximum price per fuel type. Records are
//! keyed per locality, so each base price is spread across every known
//! locality with a small bounded perturbation. Replacing this module with a
//! real per-station feed leaves the rest of the pipeline untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geocoding::LocalityTable;
use crate::normalizer::FuelType;
use crate::records::FuelPriceRecord;

/// Smallest price a fanned-out record may carry.
const MIN_PRICE: f64 = 0.001;

#[derive(Clone)]
pub struct JitterFanOut {
    amplitude: f64,
    rng: Arc<Mutex<StdRng>>,
}

impl JitterFanOut {
    pub fn new(amplitude: f64) -> Self {
        Self::with_rng(amplitude, StdRng::from_entropy())
    }

    pub fn with_rng(amplitude: f64, rng: StdRng) -> Self {
        Self {
            amplitude: amplitude.abs(),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// One record per locality, in table order.
    pub fn fan_out(
        &self,
        fuel_type: &FuelType,
        base_price: f64,
        localities: &LocalityTable,
        updated_at: DateTime<Utc>,
    ) -> Vec<FuelPriceRecord> {
        let mut rng = self.rng.lock();
        localities
            .localities()
            .iter()
            .map(|locality| {
                let variation = if self.amplitude > 0.0 {
                    rng.gen_range(-self.amplitude..=self.amplitude)
                } else {
                    0.0
                };
                // Jitter must not push a small base price to zero or below.
                FuelPriceRecord::new(
                    &locality.name,
                    fuel_type.clone(),
                    (base_price + variation).max(MIN_PRICE),
                    locality.coordinates(),
                    updated_at,
                )
            })
            .collect()
    }
}
