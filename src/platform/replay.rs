use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::{
    FixSubscription, LocationProvider, ProviderError, SettingsFailure, SubscriptionId,
    RESOLUTION_REQUIRED,
};
use crate::sampling::{parse_duration, AccuracyMode, SamplingConfig};
use crate::speed::GeoFix;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("track has no fixes")]
    Empty,
    #[error("fix {0} is earlier than the fix before it")]
    OutOfOrder(usize),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackPoint {
    /// Offset from the start of the track.
    #[serde(deserialize_with = "deserialize_offset")]
    pub at: Duration,
    pub lat: f64,
    pub lon: f64,
}

/// A recorded drive, replayed as if the fixes were arriving live.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    pub fixes: Vec<TrackPoint>,
}

impl Track {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TrackError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, TrackError> {
        let track: Track = serde_yaml::from_str(yaml)?;
        if track.fixes.is_empty() {
            return Err(TrackError::Empty);
        }
        if let Some(i) = track
            .fixes
            .windows(2)
            .position(|pair| pair[1].at < pair[0].at)
        {
            return Err(TrackError::OutOfOrder(i + 1));
        }
        Ok(track)
    }

    pub fn duration(&self) -> Duration {
        self.fixes.last().map(|p| p.at).unwrap_or_default()
    }
}

fn deserialize_offset<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Plays a [`Track`] back through the [`LocationProvider`] interface.
///
/// Fix timestamps keep the track's own spacing; `speedup` only shortens the
/// wall-clock wait between deliveries.
pub struct ReplayProvider {
    track: Arc<Track>,
    speedup: f64,
    available: AccuracyMode,
    next_id: AtomicU64,
    active: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl ReplayProvider {
    pub fn new(track: Track, speedup: f64, available: AccuracyMode) -> Self {
        let speedup = if speedup.is_finite() && speedup > 0.0 {
            speedup
        } else {
            1.0
        };
        Self {
            track: Arc::new(track),
            speedup,
            available,
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Wall-clock time a full playback takes.
    pub fn playback_duration(&self) -> Duration {
        self.track.duration().div_f64(self.speedup)
    }
}

impl LocationProvider for ReplayProvider {
    fn check_settings(&self, config: &SamplingConfig) -> Result<(), SettingsFailure> {
        if config.accuracy.satisfied_by(self.available) {
            Ok(())
        } else {
            log::warn!(
                "Replay source offers {} but {} was requested",
                self.available,
                config.accuracy
            );
            Err(SettingsFailure {
                status_code: RESOLUTION_REQUIRED,
            })
        }
    }

    fn request_periodic_fixes(
        &self,
        config: &SamplingConfig,
    ) -> Result<FixSubscription, ProviderError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(config.fix_buffer.max(1));
        let track = self.track.clone();
        let speedup = self.speedup;

        let join = runtime.spawn(async move {
            let wall_origin = Utc::now();
            let origin = Instant::now();
            for point in &track.fixes {
                sleep_until(origin + point.at.div_f64(speedup)).await;
                let offset = match chrono::Duration::from_std(point.at) {
                    Ok(offset) => offset,
                    Err(_) => break,
                };
                let fix = GeoFix::new(point.lat, point.lon, wall_origin + offset);
                if tx.send(fix).await.is_err() {
                    break;
                }
            }
            log::debug!("Replay subscription {} finished", id);
        });

        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, join);

        log::info!(
            "Replaying {} ({} fixes) at {}x",
            self.track.name.as_deref().unwrap_or("unnamed track"),
            self.track.fixes.len(),
            self.speedup
        );
        Ok(FixSubscription { id, fixes: rx })
    }

    fn cancel(&self, id: SubscriptionId) {
        if let Some(join) = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
        {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"
name: test loop
fixes:
  - { at: 0s, lat: 52.5200, lon: 13.4050 }
  - { at: 10s, lat: 52.5210, lon: 13.4050 }
  - { at: 20s, lat: 52.5220, lon: 13.4050 }
"#;

    #[test]
    fn parses_track_offsets() {
        let track = Track::from_str(TRACK).unwrap();
        assert_eq!(track.name.as_deref(), Some("test loop"));
        assert_eq!(track.fixes.len(), 3);
        assert_eq!(track.duration(), Duration::from_secs(20));
    }

    #[test]
    fn rejects_empty_and_unordered_tracks() {
        assert!(matches!(
            Track::from_str("fixes: []"),
            Err(TrackError::Empty)
        ));
        let unordered = "fixes:\n  - { at: 5s, lat: 0, lon: 0 }\n  - { at: 1s, lat: 0, lon: 0 }\n";
        assert!(matches!(
            Track::from_str(unordered),
            Err(TrackError::OutOfOrder(1))
        ));
    }

    #[test]
    fn settings_check_honours_available_accuracy() {
        let provider = ReplayProvider::new(Track::from_str(TRACK).unwrap(), 1.0, AccuracyMode::Balanced);
        let mut config = SamplingConfig::default();
        assert_eq!(
            provider.check_settings(&config),
            Err(SettingsFailure {
                status_code: RESOLUTION_REQUIRED
            })
        );

        config.accuracy = AccuracyMode::LowPower;
        assert_eq!(provider.check_settings(&config), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn replays_fixes_with_track_spacing() {
        let provider = ReplayProvider::new(
            Track::from_str(TRACK).unwrap(),
            10.0,
            AccuracyMode::HighAccuracy,
        );
        assert_eq!(provider.playback_duration(), Duration::from_secs(2));

        let mut sub = provider
            .request_periodic_fixes(&SamplingConfig::default())
            .unwrap();

        let first = sub.fixes.recv().await.unwrap();
        let second = sub.fixes.recv().await.unwrap();
        let third = sub.fixes.recv().await.unwrap();
        assert_eq!(sub.fixes.recv().await, None);

        assert_eq!((second.timestamp - first.timestamp).num_seconds(), 10);
        assert_eq!((third.timestamp - second.timestamp).num_seconds(), 10);
        assert_eq!(third.latitude, 52.5220);
    }

    #[test]
    fn subscribing_outside_a_runtime_fails() {
        let provider = ReplayProvider::new(
            Track::from_str(TRACK).unwrap(),
            1.0,
            AccuracyMode::HighAccuracy,
        );
        assert!(matches!(
            provider.request_periodic_fixes(&SamplingConfig::default()),
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_playback() {
        let provider = ReplayProvider::new(
            Track::from_str(TRACK).unwrap(),
            1.0,
            AccuracyMode::HighAccuracy,
        );
        let mut sub = provider
            .request_periodic_fixes(&SamplingConfig::default())
            .unwrap();
        assert!(sub.fixes.recv().await.is_some());

        provider.cancel(sub.id);
        assert_eq!(sub.fixes.recv().await, None);
    }
}
