use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{
    FixSubscription, LocationProvider, ProviderError, SettingsFailure, SubscriptionId,
};
use crate::sampling::SamplingConfig;
use crate::speed::GeoFix;

#[derive(Debug, Default)]
struct Inner {
    active: Option<(SubscriptionId, mpsc::Sender<GeoFix>)>,
    settings_failure: Option<i32>,
    next_id: SubscriptionId,
}

/// Location provider fed by the host.
///
/// The host pushes fixes through a [`FixFeed`]; they are forwarded to
/// whichever subscription is active and dropped when there is none.
#[derive(Debug, Clone, Default)]
pub struct ChannelLocationProvider {
    inner: Arc<Mutex<Inner>>,
}

impl ChannelLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn feed(&self) -> FixFeed {
        FixFeed {
            inner: self.inner.clone(),
        }
    }

    /// Makes subsequent settings checks fail with `status_code`, or succeed
    /// again when `None`.
    #[allow(dead_code)]
    pub fn set_settings_failure(&self, status_code: Option<i32>) {
        self.lock().settings_failure = status_code;
    }

    #[allow(dead_code)]
    pub fn is_subscribed(&self) -> bool {
        self.lock()
            .active
            .as_ref()
            .is_some_and(|(_, tx)| !tx.is_closed())
    }
}

impl LocationProvider for ChannelLocationProvider {
    fn check_settings(&self, _config: &SamplingConfig) -> Result<(), SettingsFailure> {
        match self.lock().settings_failure {
            Some(status_code) => Err(SettingsFailure { status_code }),
            None => Ok(()),
        }
    }

    fn request_periodic_fixes(
        &self,
        config: &SamplingConfig,
    ) -> Result<FixSubscription, ProviderError> {
        let mut inner = self.lock();
        if inner
            .active
            .as_ref()
            .is_some_and(|(_, tx)| !tx.is_closed())
        {
            return Err(ProviderError::Busy);
        }

        let (tx, rx) = mpsc::channel(config.fix_buffer.max(1));
        inner.next_id += 1;
        let id = inner.next_id;
        inner.active = Some((id, tx));

        log::debug!(
            "Channel provider subscription {} registered (interval {}ms)",
            id,
            config.interval_ms()
        );
        Ok(FixSubscription { id, fixes: rx })
    }

    fn cancel(&self, id: SubscriptionId) {
        let mut inner = self.lock();
        if inner.active.as_ref().is_some_and(|(active, _)| *active == id) {
            inner.active = None;
            log::debug!("Channel provider subscription {} cancelled", id);
        }
    }
}

/// Host-side handle for pushing fixes into a [`ChannelLocationProvider`].
#[derive(Debug, Clone)]
pub struct FixFeed {
    inner: Arc<Mutex<Inner>>,
}

impl FixFeed {
    /// Returns whether the fix was handed to an active subscription.
    pub fn push(&self, fix: GeoFix) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some((id, tx)) = inner.active.as_ref() else {
            log::debug!("No active subscription, dropping fix");
            return false;
        };

        match tx.try_send(fix) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("Subscription {} queue full, dropping fix", id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
