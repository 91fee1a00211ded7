use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(10_000);
const DEFAULT_FASTEST_INTERVAL: Duration = Duration::from_millis(5_000);
const DEFAULT_FIX_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccuracyMode {
    HighAccuracy,
    Balanced,
    LowPower,
}

impl AccuracyMode {
    /// Higher is more accurate.
    pub fn rank(&self) -> u8 {
        match self {
            AccuracyMode::HighAccuracy => 3,
            AccuracyMode::Balanced => 2,
            AccuracyMode::LowPower => 1,
        }
    }

    pub fn satisfied_by(&self, available: AccuracyMode) -> bool {
        available.rank() >= self.rank()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SamplingConfigError {
    #[error("sampling interval must be greater than zero")]
    ZeroInterval,
    #[error("fastest interval ({fastest_ms}ms) exceeds interval ({interval_ms}ms)")]
    FastestExceedsInterval { fastest_ms: u128, interval_ms: u128 },
    #[error("fix buffer must hold at least one fix")]
    ZeroFixBuffer,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub fastest_interval: Duration,
    pub accuracy: AccuracyMode,
    pub wait_for_accurate_fix: bool,
    /// Mark the signal as lost when no fix arrives for this long.
    #[serde(deserialize_with = "deserialize_optional_duration")]
    pub stale_after: Option<Duration>,
    pub fix_buffer: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            fastest_interval: DEFAULT_FASTEST_INTERVAL,
            accuracy: AccuracyMode::HighAccuracy,
            wait_for_accurate_fix: true,
            stale_after: None,
            fix_buffer: DEFAULT_FIX_BUFFER,
        }
    }
}

impl SamplingConfig {
    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    pub fn fastest_interval_ms(&self) -> u64 {
        self.fastest_interval.as_millis() as u64
    }

    pub fn validate(&self) -> Result<(), SamplingConfigError> {
        if self.interval.is_zero() {
            return Err(SamplingConfigError::ZeroInterval);
        }
        if self.fastest_interval > self.interval {
            return Err(SamplingConfigError::FastestExceedsInterval {
                fastest_ms: self.fastest_interval.as_millis(),
                interval_ms: self.interval.as_millis(),
            });
        }
        if self.fix_buffer == 0 {
            return Err(SamplingConfigError::ZeroFixBuffer);
        }
        Ok(())
    }
}

pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| e.to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = SamplingConfig::default();
        assert_eq!(config.interval_ms(), 10_000);
        assert_eq!(config.fastest_interval_ms(), 5_000);
        assert_eq!(config.accuracy, AccuracyMode::HighAccuracy);
        assert!(config.wait_for_accurate_fix);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn parses_humantime_durations() {
        let yaml = "interval: 2s\nfastest_interval: 500ms\naccuracy: balanced\nstale_after: 1m\n";
        let config: SamplingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.interval_ms(), 2_000);
        assert_eq!(config.fastest_interval_ms(), 500);
        assert_eq!(config.accuracy, AccuracyMode::Balanced);
        assert_eq!(config.stale_after, Some(Duration::from_secs(60)));
        assert!(config.wait_for_accurate_fix);
    }

    #[test]
    fn rejects_fastest_above_interval() {
        let config = SamplingConfig {
            interval: Duration::from_secs(1),
            fastest_interval: Duration::from_secs(2),
            ..SamplingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SamplingConfigError::FastestExceedsInterval { .. })
        ));
    }

    #[test]
    fn accuracy_ordering() {
        assert!(AccuracyMode::Balanced.satisfied_by(AccuracyMode::HighAccuracy));
        assert!(!AccuracyMode::HighAccuracy.satisfied_by(AccuracyMode::LowPower));
        assert_eq!(AccuracyMode::LowPower.to_string(), "low_power");
    }
}
