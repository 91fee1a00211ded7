use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::bridge::{SpeedBus, SubscriptionHandle};
use crate::speed::SpeedReading;

/// Dashboard view of the most recent reading.
#[derive(Debug, Clone, Serialize)]
pub struct GaugeView {
    /// Needle position, `speed_kmh` clamped to the dial range.
    pub dial_kmh: f64,
    pub max_kmh: f64,
    pub reading: Option<SpeedReading>,
}

#[derive(Debug, Clone)]
pub struct Gauge {
    max_kmh: f64,
    latest: Arc<Mutex<Option<SpeedReading>>>,
}

impl Gauge {
    pub fn new(max_kmh: f64) -> Self {
        Self {
            max_kmh: if max_kmh > 0.0 { max_kmh } else { 240.0 },
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribes the gauge to `bus`.
    pub fn attach(&self, bus: &SpeedBus) -> SubscriptionHandle {
        let gauge = self.clone();
        let (handle, _join) = bus.subscribe_with(move |reading| gauge.update(reading));
        handle
    }

    pub fn update(&self, reading: SpeedReading) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(reading);
    }

    pub fn view(&self) -> GaugeView {
        let reading = *self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let dial_kmh = reading
            .map(|r| r.speed_kmh.clamp(0.0, self.max_kmh))
            .unwrap_or(0.0);
        GaugeView {
            dial_kmh,
            max_kmh: self.max_kmh,
            reading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn reading(kmh: f64) -> SpeedReading {
        SpeedReading {
            distance_m: 0.0,
            speed_mps: kmh / 3.6,
            speed_kmh: kmh,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn dial_follows_real_speed() {
        let gauge = Gauge::new(200.0);
        assert_eq!(gauge.view().dial_kmh, 0.0);

        gauge.update(reading(87.5));
        assert_eq!(gauge.view().dial_kmh, 87.5);

        gauge.update(reading(350.0));
        assert_eq!(gauge.view().dial_kmh, 200.0);
    }

    #[tokio::test]
    async fn attached_gauge_tracks_bus() {
        let bus = SpeedBus::default();
        let gauge = Gauge::new(240.0);
        gauge.attach(&bus);

        bus.publish(reading(63.0));
        tokio::time::timeout(Duration::from_secs(1), async {
            while gauge.view().reading.is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(gauge.view().dial_kmh, 63.0);
    }
}
