//! Upstream label and price-text normalization.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FuelType {
    Diesel,
    Euro95,
    Euro98,
    Lpg,
    /// Upstream label that matched no known fuel type, kept verbatim.
    Other(String),
}

/// Ordered: the first pattern contained in a label decides its type.
const LABEL_PATTERNS: &[(&str, FuelType)] = &[
    ("Diesel", FuelType::Diesel),
    ("95", FuelType::Euro95),
    ("98", FuelType::Euro98),
    ("LPG", FuelType::Lpg),
];

impl FuelType {
    pub fn as_str(&self) -> &str {
        match self {
            FuelType::Diesel => "Diesel",
            FuelType::Euro95 => "Euro 95",
            FuelType::Euro98 => "Euro 98",
            FuelType::Lpg => "LPG",
            FuelType::Other(label) => label,
        }
    }

    fn from_wire(label: &str) -> Self {
        match label {
            "Diesel" => FuelType::Diesel,
            "Euro 95" => FuelType::Euro95,
            "Euro 98" => FuelType::Euro98,
            "LPG" => FuelType::Lpg,
            other => FuelType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FuelType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FuelType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(FuelType::from_wire(&label))
    }
}

pub fn canonicalize_fuel_type(label: &str) -> FuelType {
    LABEL_PATTERNS
        .iter()
        .find(|(pattern, _)| label.contains(pattern))
        .map(|(_, fuel_type)| fuel_type.clone())
        .unwrap_or_else(|| FuelType::Other(label.to_string()))
}

/// Parses strings such as `"1,897 €"`.
pub fn parse_price(text: &str) -> AppResult<f64> {
    let cleaned = text.replace('€', "").replacen(',', ".", 1);
    let value = cleaned
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::parse(text))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::parse(text));
    }
    Ok(value)
}
