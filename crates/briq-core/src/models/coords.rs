//! Geographic coordinates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatesParseError {
    #[error("expected \"<latitude>,<longitude>\"")]
    Shape,
    #[error("invalid number: {0}")]
    Number(String),
    #[error("coordinates out of range")]
    OutOfRange,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within the WGS84 ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// OpenStreetMap link centred on this position.
    #[must_use]
    pub fn map_url(&self) -> String {
        format!(
            "https://www.openstreetmap.org/?mlat={}&mlon={}&zoom=16",
            self.latitude, self.longitude
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}°, {:.6}°", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinates {
    type Err = CoordinatesParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s.split_once(',').ok_or(CoordinatesParseError::Shape)?;
        let parse = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| CoordinatesParseError::Number(raw.trim().to_string()))
        };
        let coords = Self::new(parse(lat)?, parse(lon)?);
        if coords.is_valid() {
            Ok(coords)
        } else {
            Err(CoordinatesParseError::OutOfRange)
        }
    }
}
