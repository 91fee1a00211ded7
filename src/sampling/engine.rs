use std::future::pending;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use strum_macros::Display;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::config::SamplingConfig;
use super::error::EngineError;
use crate::bridge::SpeedBus;
use crate::platform::{location_permitted, LocationProvider, PermissionAuthority, SubscriptionId};
use crate::speed::{GeoFix, PositionStore, SpeedCalculator, SpeedReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What the engine knows about the incoming fix stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalState {
    Idle,
    /// Subscribed, no fix yet.
    Waiting,
    Live,
    /// No fix within `stale_after`.
    Lost,
    /// The provider closed the stream.
    Ended,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub signal: SignalState,
    pub last_reading: Option<SpeedReading>,
    pub fixes_handled: u64,
    pub fixes_discarded: u64,
}

impl EngineStatus {
    fn stopped() -> Self {
        Self {
            state: EngineState::Stopped,
            signal: SignalState::Idle,
            last_reading: None,
            fixes_handled: 0,
            fixes_discarded: 0,
        }
    }
}

#[derive(Debug)]
struct Shared {
    status: EngineStatus,
}

fn lock_shared(shared: &StdMutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Read-only view of the engine status that can be held without owning the
/// engine.
#[derive(Debug, Clone)]
pub struct EngineMonitor {
    shared: Arc<StdMutex<Shared>>,
}

impl EngineMonitor {
    pub fn status(&self) -> EngineStatus {
        lock_shared(&self.shared).status.clone()
    }
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
    subscription: SubscriptionId,
}

/// Everything the fix-handling worker needs, moved into its task.
struct FixPipeline {
    store: Arc<PositionStore>,
    calculator: SpeedCalculator,
    bus: SpeedBus,
    shared: Arc<StdMutex<Shared>>,
}

impl FixPipeline {
    fn handle_fix(&self, fix: GeoFix) {
        if let Some(current) = self.store.current() {
            if fix.timestamp < current.timestamp {
                log::warn!(
                    "Discarding fix from {} (older than current fix from {})",
                    fix.timestamp,
                    current.timestamp
                );
                lock_shared(&self.shared).status.fixes_discarded += 1;
                return;
            }
        }

        let (previous, current) = self.store.record(fix);
        let reading = self.calculator.compute(&previous, &current);

        {
            let mut locked = lock_shared(&self.shared);
            if locked.status.signal == SignalState::Lost {
                log::info!("Location signal recovered");
            }
            locked.status.signal = SignalState::Live;
            locked.status.last_reading = Some(reading);
            locked.status.fixes_handled += 1;
        }

        let delivered = self.bus.publish(reading);
        log::debug!(
            "Fix {:.6},{:.6}: {:.1} m, {:.2} km/h ({} subscribers)",
            fix.latitude,
            fix.longitude,
            reading.distance_m,
            reading.speed_kmh,
            delivered
        );
    }

    fn set_signal(&self, signal: SignalState) -> SignalState {
        let mut locked = lock_shared(&self.shared);
        std::mem::replace(&mut locked.status.signal, signal)
    }
}

/// Samples positions from a [`LocationProvider`] and publishes a
/// [`SpeedReading`] for every fix.
///
/// Fixes are handled one at a time on a single worker task, so recording,
/// computing and publishing for one fix never interleave with another.
pub struct SamplingEngine {
    config: SamplingConfig,
    provider: Arc<dyn LocationProvider>,
    permissions: Arc<dyn PermissionAuthority>,
    store: Arc<PositionStore>,
    calculator: SpeedCalculator,
    bus: SpeedBus,
    shared: Arc<StdMutex<Shared>>,
    worker: Option<WorkerHandle>,
}

impl SamplingEngine {
    pub fn new(
        config: SamplingConfig,
        provider: Arc<dyn LocationProvider>,
        permissions: Arc<dyn PermissionAuthority>,
        bus: SpeedBus,
    ) -> Self {
        Self::with_store(
            config,
            provider,
            permissions,
            bus,
            Arc::new(PositionStore::new()),
        )
    }

    pub fn with_store(
        config: SamplingConfig,
        provider: Arc<dyn LocationProvider>,
        permissions: Arc<dyn PermissionAuthority>,
        bus: SpeedBus,
        store: Arc<PositionStore>,
    ) -> Self {
        let calculator = SpeedCalculator::new(config.interval);
        Self {
            config,
            provider,
            permissions,
            store,
            calculator,
            bus,
            shared: Arc::new(StdMutex::new(Shared {
                status: EngineStatus::stopped(),
            })),
            worker: None,
        }
    }

    #[allow(dead_code)]
    pub fn bus(&self) -> &SpeedBus {
        &self.bus
    }

    #[allow(dead_code)]
    pub fn store(&self) -> Arc<PositionStore> {
        self.store.clone()
    }

    pub fn monitor(&self) -> EngineMonitor {
        EngineMonitor {
            shared: self.shared.clone(),
        }
    }

    pub fn status(&self) -> EngineStatus {
        lock_shared(&self.shared).status.clone()
    }

    pub fn state(&self) -> EngineState {
        lock_shared(&self.shared).status.state
    }

    fn set_state(&self, state: EngineState) {
        lock_shared(&self.shared).status.state = state;
    }

    /// Starts sampling. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.worker.is_some() || self.state() != EngineState::Stopped {
            return Err(EngineError::AlreadyRunning);
        }

        self.set_state(EngineState::Starting);

        if !location_permitted(self.permissions.as_ref()) {
            log::warn!("Cannot start sampling: location permission missing");
            self.set_state(EngineState::Stopped);
            return Err(EngineError::PermissionDenied);
        }

        if let Err(failure) = self.provider.check_settings(&self.config) {
            log::warn!(
                "Location settings not satisfied (status {})",
                failure.status_code
            );
            self.set_state(EngineState::Stopped);
            return Err(EngineError::SettingsUnsatisfiable {
                status_code: failure.status_code,
            });
        }

        let subscription = match self.provider.request_periodic_fixes(&self.config) {
            Ok(subscription) => subscription,
            Err(e) => {
                log::error!("Location provider refused subscription: {}", e);
                self.set_state(EngineState::Stopped);
                return Err(e.into());
            }
        };

        self.store.reset();
        {
            let mut locked = lock_shared(&self.shared);
            locked.status = EngineStatus::stopped();
            locked.status.state = EngineState::Starting;
            locked.status.signal = SignalState::Waiting;
        }

        let pipeline = FixPipeline {
            store: self.store.clone(),
            calculator: self.calculator,
            bus: self.bus.clone(),
            shared: self.shared.clone(),
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_sampling_loop(
            pipeline,
            subscription.fixes,
            stop_rx,
            self.config.stale_after,
        ));

        self.worker = Some(WorkerHandle {
            stop_tx,
            join,
            subscription: subscription.id,
        });
        self.set_state(EngineState::Running);

        log::info!(
            "Sampling started (interval {}ms, fastest {}ms, {}, wait for accurate fix: {})",
            self.config.interval_ms(),
            self.config.fastest_interval_ms(),
            self.config.accuracy,
            self.config.wait_for_accurate_fix
        );
        Ok(())
    }

    /// Stops sampling. A no-op when already stopped.
    ///
    /// Waits for the fix being handled, if any, before the store is cleared.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.set_state(EngineState::Stopping);

        let _ = worker.stop_tx.send(());
        if let Err(e) = worker.join.await {
            log::error!("Sampling worker failed: {}", e);
        }

        self.provider.cancel(worker.subscription);
        self.store.reset();

        {
            let mut locked = lock_shared(&self.shared);
            let handled = locked.status.fixes_handled;
            locked.status = EngineStatus::stopped();
            log::info!("Sampling stopped after {} fixes", handled);
        }
    }
}

impl Drop for SamplingEngine {
    fn drop(&mut self) {
        // Dropping the stop sender ends the worker loop on its own.
        if let Some(worker) = self.worker.take() {
            self.provider.cancel(worker.subscription);
        }
    }
}

async fn run_sampling_loop(
    pipeline: FixPipeline,
    mut fixes: mpsc::Receiver<GeoFix>,
    mut stop_rx: oneshot::Receiver<()>,
    stale_after: Option<Duration>,
) {
    let mut stream_open = true;

    loop {
        let window = stale_after.filter(|_| stream_open);
        let watchdog = async move {
            match window {
                Some(window) => sleep(window).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            _ = &mut stop_rx => break,
            fix = fixes.recv(), if stream_open => match fix {
                Some(fix) => pipeline.handle_fix(fix),
                None => {
                    stream_open = false;
                    pipeline.set_signal(SignalState::Ended);
                    log::warn!("Location provider closed the fix stream");
                }
            },
            _ = watchdog => {
                if pipeline.set_signal(SignalState::Lost) != SignalState::Lost {
                    log::warn!("No location fix received for {:?}", stale_after.unwrap_or_default());
                }
            }
        }
    }
}
