//! Drives the sampling engine from UI and permission events.
//!
//! Lifecycle events are plain inputs here. The coordinator turns each one
//! into engine calls and hands back [`Directive`]s describing what the host
//! UI should do next (ask for permission, show or hide the tracking notice).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::Mutex;

use crate::platform::{location_permitted, PermissionAuthority};
use crate::sampling::{EngineError, EngineState, SamplingEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleSignal {
    /// User asked to start tracking.
    StartRequested,
    /// User, or the tracking notice, asked to stop tracking.
    StopRequested,
    PermissionGranted,
    PermissionDenied,
    PermissionRevoked,
    /// The UI bound or rebound to the tracker.
    EnteredForeground,
    /// The UI unbound; tracking continues in the background.
    EnteredBackground,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Directive {
    RequestPermission,
    ExplainPermissionDenied,
    ShowTrackingNotice,
    HideTrackingNotice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Presence {
    Foreground,
    Background,
}

pub struct LifecycleCoordinator {
    engine: Arc<Mutex<SamplingEngine>>,
    permissions: Arc<dyn PermissionAuthority>,
    presence: Presence,
    notice_shown: bool,
    pending_start: bool,
}

impl LifecycleCoordinator {
    pub fn new(
        engine: Arc<Mutex<SamplingEngine>>,
        permissions: Arc<dyn PermissionAuthority>,
    ) -> Self {
        Self {
            engine,
            permissions,
            presence: Presence::Foreground,
            notice_shown: false,
            pending_start: false,
        }
    }

    #[allow(dead_code)]
    pub fn engine(&self) -> Arc<Mutex<SamplingEngine>> {
        self.engine.clone()
    }

    #[allow(dead_code)]
    pub fn presence(&self) -> Presence {
        self.presence
    }

    #[allow(dead_code)]
    pub fn pending_start(&self) -> bool {
        self.pending_start
    }

    pub async fn handle(&mut self, signal: LifecycleSignal) -> Result<Vec<Directive>, EngineError> {
        log::debug!("Lifecycle signal: {}", signal);
        let mut directives = Vec::new();

        match signal {
            LifecycleSignal::StartRequested => {
                if location_permitted(self.permissions.as_ref()) {
                    self.start_engine(&mut directives).await?;
                } else {
                    self.pending_start = true;
                    directives.push(Directive::RequestPermission);
                }
            }
            LifecycleSignal::PermissionGranted => {
                if self.pending_start {
                    self.pending_start = false;
                    self.start_engine(&mut directives).await?;
                }
            }
            LifecycleSignal::PermissionDenied => {
                self.pending_start = false;
                directives.push(Directive::ExplainPermissionDenied);
            }
            LifecycleSignal::PermissionRevoked => {
                if location_permitted(self.permissions.as_ref()) {
                    log::debug!("Location still permitted, tracking continues");
                } else {
                    self.pending_start = false;
                    self.stop_engine(&mut directives).await;
                }
            }
            LifecycleSignal::EnteredForeground => {
                self.presence = Presence::Foreground;
                self.hide_notice(&mut directives);
            }
            LifecycleSignal::EnteredBackground => {
                self.presence = Presence::Background;
                if self.engine.lock().await.state() == EngineState::Running {
                    self.show_notice(&mut directives);
                }
            }
            LifecycleSignal::StopRequested => {
                self.pending_start = false;
                self.stop_engine(&mut directives).await;
            }
            LifecycleSignal::Destroyed => {
                self.pending_start = false;
                self.stop_engine(&mut directives).await;
            }
        }

        Ok(directives)
    }

    async fn start_engine(&mut self, directives: &mut Vec<Directive>) -> Result<(), EngineError> {
        let result = self.engine.lock().await.start();
        match result {
            Ok(()) => {}
            Err(EngineError::AlreadyRunning) => {
                log::debug!("Start requested while already sampling");
            }
            Err(EngineError::PermissionDenied) => {
                self.pending_start = true;
                directives.push(Directive::RequestPermission);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if self.presence == Presence::Background {
            self.show_notice(directives);
        }
        Ok(())
    }

    async fn stop_engine(&mut self, directives: &mut Vec<Directive>) {
        self.engine.lock().await.stop().await;
        self.hide_notice(directives);
    }

    fn show_notice(&mut self, directives: &mut Vec<Directive>) {
        if !self.notice_shown {
            self.notice_shown = true;
            directives.push(Directive::ShowTrackingNotice);
        }
    }

    fn hide_notice(&mut self, directives: &mut Vec<Directive>) {
        if self.notice_shown {
            self.notice_shown = false;
            directives.push(Directive::HideTrackingNotice);
        }
    }
}
