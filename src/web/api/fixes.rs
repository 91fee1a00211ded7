use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::speed::GeoFix;
use crate::web::api::error::{ApiError, ApiResult};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct FixRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Defaults to the time the request is handled.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct FixResponse {
    /// False when no sampling session is listening.
    pub accepted: bool,
}

pub async fn push_fix(
    State(state): State<AppState>,
    Json(request): Json<FixRequest>,
) -> ApiResult<Json<FixResponse>> {
    if !(-90.0..=90.0).contains(&request.latitude) {
        return Err(ApiError::Validation("latitude out of range".into()));
    }
    if !(-180.0..=180.0).contains(&request.longitude) {
        return Err(ApiError::Validation("longitude out of range".into()));
    }

    let fix = GeoFix::new(
        request.latitude,
        request.longitude,
        request.timestamp.unwrap_or_else(Utc::now),
    );
    Ok(Json(FixResponse {
        accepted: state.feed.push(fix),
    }))
}
