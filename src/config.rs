use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::bridge::DEFAULT_SUBSCRIBER_BUFFER;
use crate::platform::Capability;
use crate::sampling::{AccuracyMode, SamplingConfig, SamplingConfigError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid sampling config: {0}")]
    Sampling(#[from] SamplingConfigError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sampling: SamplingConfig,
    pub permissions: PermissionsConfig,
    pub bridge: BridgeConfig,
    pub web: WebConfig,
    pub replay: Option<ReplayConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub granted: Vec<Capability>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: vec![Capability::FineLocation],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub subscriber_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_gauge_max")]
    pub gauge_max_kmh: f64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            gauge_max_kmh: default_gauge_max(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_gauge_max() -> f64 {
    240.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    pub track: PathBuf,
    #[serde(default = "default_speedup")]
    pub speedup: f64,
    #[serde(default = "default_replay_accuracy")]
    pub accuracy: AccuracyMode,
}

fn default_speedup() -> f64 {
    1.0
}

fn default_replay_accuracy() -> AccuracyMode {
    AccuracyMode::HighAccuracy
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.sampling.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_str("{}").unwrap();
        assert_eq!(config.sampling, SamplingConfig::default());
        assert_eq!(config.permissions.granted, vec![Capability::FineLocation]);
        assert_eq!(config.bridge.subscriber_buffer, DEFAULT_SUBSCRIBER_BUFFER);
        assert_eq!(config.web.bind, "127.0.0.1:8080");
        assert!(config.replay.is_none());
    }

    #[test]
    fn full_document() {
        let yaml = r#"
sampling:
  interval: 4s
  fastest_interval: 2s
  accuracy: balanced
  wait_for_accurate_fix: false
  stale_after: 20s
permissions:
  granted: [coarse_location]
bridge:
  subscriber_buffer: 2
web:
  bind: 0.0.0.0:9000
replay:
  track: tracks/demo-drive.yaml
  speedup: 5
"#;
        let config = AppConfig::from_str(yaml).unwrap();
        assert_eq!(config.sampling.interval, Duration::from_secs(4));
        assert_eq!(config.sampling.accuracy, AccuracyMode::Balanced);
        assert!(!config.sampling.wait_for_accurate_fix);
        assert_eq!(config.permissions.granted, vec![Capability::CoarseLocation]);
        assert_eq!(config.bridge.subscriber_buffer, 2);
        assert_eq!(config.web.bind, "0.0.0.0:9000");
        assert_eq!(config.web.gauge_max_kmh, 240.0);

        let replay = config.replay.unwrap();
        assert_eq!(replay.speedup, 5.0);
        assert_eq!(replay.accuracy, AccuracyMode::HighAccuracy);
    }

    #[test]
    fn invalid_sampling_is_rejected() {
        let yaml = "sampling:\n  interval: 1s\n  fastest_interval: 5s\n";
        assert!(matches!(
            AppConfig::from_str(yaml),
            Err(ConfigError::Sampling(_))
        ));
    }

    #[test]
    fn bad_duration_is_a_yaml_error() {
        let yaml = "sampling:\n  interval: soon\n";
        assert!(matches!(AppConfig::from_str(yaml), Err(ConfigError::Yaml(_))));
    }
}
