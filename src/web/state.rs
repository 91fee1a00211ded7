use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bridge::SpeedBus;
use crate::config::AppConfig;
use crate::lifecycle::LifecycleCoordinator;
use crate::platform::{ChannelLocationProvider, FixFeed, StaticPermissions};
use crate::sampling::{EngineMonitor, SamplingEngine};

use super::gauge::Gauge;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Mutex<LifecycleCoordinator>>,
    pub monitor: EngineMonitor,
    pub bus: SpeedBus,
    pub permissions: Arc<StaticPermissions>,
    pub feed: FixFeed,
    pub gauge: Gauge,
}

impl AppState {
    /// Wires an engine to a host-fed provider. Must be called from within a
    /// tokio runtime.
    pub fn from_config(config: &AppConfig) -> Self {
        let provider = ChannelLocationProvider::new();
        let feed = provider.feed();
        let permissions = Arc::new(StaticPermissions::new(
            config.permissions.granted.iter().copied(),
        ));
        let bus = SpeedBus::new(config.bridge.subscriber_buffer);

        let gauge = Gauge::new(config.web.gauge_max_kmh);
        gauge.attach(&bus);

        let engine = SamplingEngine::new(
            config.sampling.clone(),
            Arc::new(provider),
            permissions.clone(),
            bus.clone(),
        );
        let monitor = engine.monitor();
        let coordinator =
            LifecycleCoordinator::new(Arc::new(Mutex::new(engine)), permissions.clone());

        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            monitor,
            bus,
            permissions,
            feed,
            gauge,
        }
    }
}
