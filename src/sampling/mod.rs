mod config;
mod engine;
mod error;

pub(crate) use config::parse_duration;
pub use config::{AccuracyMode, SamplingConfig, SamplingConfigError};
pub use engine::{EngineMonitor, EngineState, EngineStatus, SamplingEngine, SignalState};
pub use error::EngineError;
