use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geocoding::Coordinates;
use crate::normalizer::FuelType;

const STATION_SUFFIX: &str = "Station";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelPriceRecord {
    pub id: String,
    pub station_name: String,
    pub fuel_type: FuelType,
    pub price: f64,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: DateTime<Utc>,
}

impl FuelPriceRecord {
    pub fn new(
        locality: &str,
        fuel_type: FuelType,
        price: f64,
        coordinates: Coordinates,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: record_id(locality, &fuel_type),
            station_name: format!("{locality} {STATION_SUFFIX}"),
            fuel_type,
            price: round_price(price),
            lat: coordinates.lat,
            lng: coordinates.lng,
            updated_at,
        }
    }
}

pub fn record_id(locality: &str, fuel_type: &FuelType) -> String {
    format!("{locality}-{fuel_type}").to_lowercase()
}

/// Rounds to three decimals, the precision upstream publishes.
pub fn round_price(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// A `(label, price text)` pair as read from one upstream table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPriceRow {
    pub label: String,
    pub price_text: String,
}

impl RawPriceRow {
    pub fn new(label: impl Into<String>, price_text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            price_text: price_text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn serializes_with_camel_case_fields() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let record = FuelPriceRecord::new(
            "Liège",
            FuelType::Euro95,
            1.78949,
            Coordinates {
                lat: 50.6326,
                lng: 5.5797,
            },
            at,
        );

        assert_eq!(record.id, "liège-euro 95");
        assert_eq!(record.station_name, "Liège Station");
        assert_eq!(record.price, 1.789);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["stationName"], "Liège Station");
        assert_eq!(value["fuelType"], "Euro 95");
        assert_eq!(value["updatedAt"], "2024-05-01T06:00:00Z");
        assert!(value.get("station_name").is_none());
    }
}
