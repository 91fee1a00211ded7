use thiserror::Error;

use crate::platform::ProviderError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sampling engine already running")]
    AlreadyRunning,
    #[error("location permission not granted")]
    PermissionDenied,
    #[error("location settings cannot be satisfied (status {status_code})")]
    SettingsUnsatisfiable { status_code: i32 },
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}
