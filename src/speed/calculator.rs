use std::time::Duration;

use super::types::{GeoFix, SpeedReading};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const MPS_TO_KMH: f64 = 3.6;

/// Great-circle distance between two fixes in meters (haversine).
pub fn haversine_distance_m(from: &GeoFix, to: &GeoFix) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat_rad().cos() * to.lat_rad().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1.0 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    let distance = EARTH_RADIUS_M * c;
    if distance.is_finite() {
        distance
    } else {
        0.0
    }
}

/// Converts a pair of fixes into a [`SpeedReading`].
///
/// Elapsed time is floored to `min_elapsed` so that two fixes arriving almost
/// together cannot produce an absurd speed. With a zero floor and a zero
/// elapsed time the speed is reported as zero.
#[derive(Debug, Clone, Copy)]
pub struct SpeedCalculator {
    min_elapsed_s: f64,
}

impl SpeedCalculator {
    pub fn new(min_elapsed: Duration) -> Self {
        Self {
            min_elapsed_s: min_elapsed.as_secs_f64(),
        }
    }

    pub fn compute(&self, prev: &GeoFix, curr: &GeoFix) -> SpeedReading {
        if prev == curr {
            return SpeedReading::stationary(curr.timestamp);
        }

        let distance_m = haversine_distance_m(prev, curr);
        let elapsed_s = self.effective_elapsed_s(prev, curr);

        let speed_mps = if elapsed_s > 0.0 {
            distance_m / elapsed_s
        } else {
            0.0
        };
        let speed_mps = if speed_mps.is_finite() { speed_mps } else { 0.0 };

        SpeedReading {
            distance_m,
            speed_mps,
            speed_kmh: speed_mps * MPS_TO_KMH,
            computed_at: curr.timestamp,
        }
    }

    fn effective_elapsed_s(&self, prev: &GeoFix, curr: &GeoFix) -> f64 {
        let elapsed = curr.timestamp - prev.timestamp;
        let elapsed_s = elapsed
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or_else(|| elapsed.num_seconds() as f64)
            .abs();

        elapsed_s.max(self.min_elapsed_s)
    }
}
