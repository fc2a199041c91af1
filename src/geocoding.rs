//! Locality names and the coordinates records are pinned to.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult};

/// Centre used for names the table does not know.
const FALLBACK_CENTER: Coordinates = Coordinates {
    lat: 50.8503,
    lng: 4.3517,
};
/// Total width, in degrees, of the box fallback coordinates land in.
const FALLBACK_SPAN: f64 = 2.0;

const BELGIAN_LOCALITIES: &[(&str, f64, f64)] = &[
    ("Bruxelles", 50.8503, 4.3517),
    ("Antwerpen", 51.2194, 4.4025),
    ("Gent", 51.0543, 3.7174),
    ("Charleroi", 50.4108, 4.4446),
    ("Liège", 50.6326, 5.5797),
    ("Bruges", 51.2093, 3.2247),
    ("Namur", 50.4674, 4.872),
    ("Leuven", 50.8798, 4.7005),
    ("Mons", 50.4542, 3.9566),
    ("Mechelen", 51.0259, 4.4775),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Locality {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalityTable {
    localities: Vec<Locality>,
}

impl LocalityTable {
    pub fn belgium() -> Self {
        Self {
            localities: BELGIAN_LOCALITIES
                .iter()
                .map(|(name, lat, lng)| Locality::new(*name, *lat, *lng))
                .collect(),
        }
    }

    pub fn from_localities(localities: Vec<Locality>) -> AppResult<Self> {
        if localities.is_empty() {
            return Err(AppError::Config("locality table cannot be empty".into()));
        }
        let mut seen = HashSet::new();
        for locality in &localities {
            if locality.name.trim().is_empty() {
                return Err(AppError::Config("locality name cannot be blank".into()));
            }
            // Record ids are lower-cased, so names must differ beyond case.
            if !seen.insert(locality.name.to_lowercase()) {
                return Err(AppError::Config(format!(
                    "duplicate locality {}",
                    locality.name
                )));
            }
            if !(-90.0..=90.0).contains(&locality.lat) || !(-180.0..=180.0).contains(&locality.lng)
            {
                return Err(AppError::Config(format!(
                    "locality {} has out-of-range coordinates",
                    locality.name
                )));
            }
        }
        Ok(Self { localities })
    }

    /// Reads `name,lat,lng` rows (with a header line).
    pub fn from_csv_path(path: &Path) -> AppResult<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let localities = reader
            .deserialize::<Locality>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_localities(localities)
    }

    pub fn localities(&self) -> &[Locality] {
        &self.localities
    }

    pub fn len(&self) -> usize {
        self.localities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.localities.is_empty()
    }

    /// Exact name first, then a case-insensitive containment match in either
    /// direction, then a deterministic fallback.
    pub fn coordinates_for(&self, name: &str) -> Coordinates {
        if let Some(locality) = self.localities.iter().find(|l| l.name == name) {
            return locality.coordinates();
        }

        let needle = name.to_lowercase();
        if !needle.is_empty() {
            if let Some(locality) = self.localities.iter().find(|l| {
                let candidate = l.name.to_lowercase();
                needle.contains(&candidate) || candidate.contains(&needle)
            }) {
                return locality.coordinates();
            }
        }

        fallback_coordinates(name)
    }
}

impl Default for LocalityTable {
    fn default() -> Self {
        Self::belgium()
    }
}

/// Places an unknown name inside a 2°×2° box around Brussels. The position is
/// derived from a hash of the name so repeated lookups agree.
pub fn fallback_coordinates(name: &str) -> Coordinates {
    let digest = Sha256::digest(name.as_bytes());
    let lat_seed = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let lng_seed = u32::from_le_bytes([digest[4], digest[5], digest[6], digest[7]]);
    Coordinates {
        lat: FALLBACK_CENTER.lat + (unit_interval(lat_seed) - 0.5) * FALLBACK_SPAN,
        lng: FALLBACK_CENTER.lng + (unit_interval(lng_seed) - 0.5) * FALLBACK_SPAN,
    }
}

fn unit_interval(seed: u32) -> f64 {
    f64::from(seed) / f64::from(u32::MAX)
}
