use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::sampling::EngineError;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Conflict(&'static str),
    Forbidden(&'static str),
    Settings(i32),
    Provider(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::AlreadyRunning => ApiError::Conflict("engine_running"),
            EngineError::PermissionDenied => ApiError::Forbidden("permission_denied"),
            EngineError::SettingsUnsatisfiable { status_code } => ApiError::Settings(status_code),
            EngineError::Provider(e) => ApiError::Provider(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message("validation_failed", &msg)),
            )
                .into_response(),
            ApiError::Conflict(reason) => {
                (StatusCode::CONFLICT, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Settings(status_code) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse::with_message(
                    "settings_unsatisfiable",
                    &format!("location settings status {}", status_code),
                )),
            )
                .into_response(),
            ApiError::Provider(msg) => (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::with_message("provider_error", &msg)),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let cases = [
            (EngineError::AlreadyRunning, StatusCode::CONFLICT),
            (EngineError::PermissionDenied, StatusCode::FORBIDDEN),
            (
                EngineError::SettingsUnsatisfiable { status_code: 6 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EngineError::Provider(crate::platform::ProviderError::Busy),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
