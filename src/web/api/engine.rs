use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::bridge::BusStats;
use crate::lifecycle::{Directive, LifecycleSignal};
use crate::platform::Capability;
use crate::sampling::EngineStatus;
use crate::web::api::error::ApiResult;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub signal: LifecycleSignal,
}

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub directives: Vec<Directive>,
    pub status: EngineStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub engine: EngineStatus,
    pub bus: BusStats,
}

pub async fn lifecycle(
    State(state): State<AppState>,
    Json(request): Json<LifecycleRequest>,
) -> ApiResult<Json<LifecycleResponse>> {
    // Permission results come from the host's dialog, so record them before
    // the coordinator looks.
    match request.signal {
        LifecycleSignal::PermissionGranted => state.permissions.grant(Capability::FineLocation),
        LifecycleSignal::PermissionRevoked => state.permissions.revoke_all(),
        _ => {}
    }

    let directives = state
        .coordinator
        .lock()
        .await
        .handle(request.signal)
        .await?;

    Ok(Json(LifecycleResponse {
        directives,
        status: state.monitor.status(),
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        engine: state.monitor.status(),
        bus: state.bus.stats(),
    })
}
