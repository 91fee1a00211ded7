use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single reported position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude.to_radians()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedReading {
    pub distance_m: f64,
    pub speed_mps: f64,
    pub speed_kmh: f64,
    pub computed_at: DateTime<Utc>,
}

impl SpeedReading {
    pub fn stationary(at: DateTime<Utc>) -> Self {
        Self {
            distance_m: 0.0,
            speed_mps: 0.0,
            speed_kmh: 0.0,
            computed_at: at,
        }
    }
}
