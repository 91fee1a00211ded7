//! Host platform collaborators.
//!
//! The sampling engine never talks to GPS hardware or the OS permission
//! system directly. It goes through [`LocationProvider`] and
//! [`PermissionAuthority`], which the host implements (or which one of the
//! adapters in this module stands in for).

mod channel;
mod permissions;
mod replay;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::sampling::SamplingConfig;
use crate::speed::GeoFix;

pub use channel::{ChannelLocationProvider, FixFeed};
pub use permissions::StaticPermissions;
pub use replay::{ReplayProvider, Track};

/// Settings status reported when the user has to change location settings.
pub const RESOLUTION_REQUIRED: i32 = 6;
/// Settings status reported when location settings cannot be changed at all.
#[allow(dead_code)]
pub const SETTINGS_CHANGE_UNAVAILABLE: i32 = 8502;

pub type SubscriptionId = u64;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("location provider unavailable: {0}")]
    Unavailable(String),
    #[error("location provider already has an active subscription")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsFailure {
    pub status_code: i32,
}

/// A live periodic-fix registration.
///
/// Fixes arrive on `fixes` until the provider cancels the subscription or
/// runs out of data, at which point the channel closes.
#[derive(Debug)]
pub struct FixSubscription {
    pub id: SubscriptionId,
    pub fixes: mpsc::Receiver<GeoFix>,
}

pub trait LocationProvider: Send + Sync {
    /// Checks whether the platform can honour `config` as requested.
    fn check_settings(&self, config: &SamplingConfig) -> Result<(), SettingsFailure>;

    fn request_periodic_fixes(
        &self,
        config: &SamplingConfig,
    ) -> Result<FixSubscription, ProviderError>;

    fn cancel(&self, id: SubscriptionId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    FineLocation,
    CoarseLocation,
}

pub trait PermissionAuthority: Send + Sync {
    fn has_capability(&self, capability: Capability) -> bool;
}

/// Fine or coarse location is enough to sample.
pub fn location_permitted(authority: &dyn PermissionAuthority) -> bool {
    authority.has_capability(Capability::FineLocation)
        || authority.has_capability(Capability::CoarseLocation)
}
