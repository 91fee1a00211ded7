use axum::{extract::State, Json};

use crate::web::{AppState, GaugeView};

pub async fn latest(State(state): State<AppState>) -> Json<GaugeView> {
    Json(state.gauge.view())
}
