use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_core::CoreError;
use serde_json::json;

/// HTTP-facing wrapper around the shared error taxonomy, with a catch-all
/// arm for failures outside it (gateway out-calls and the like).
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Internal(anyhow::Error),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let core = match self {
            ApiError::Core(err) => err,
            ApiError::Internal(err) => {
                tracing::error!("internal error: {:#}", err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response();
            }
        };

        let (status, body) = match &core {
            CoreError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{what} not found") }),
            ),
            CoreError::SeatsUnavailable { taken } => (
                StatusCode::CONFLICT,
                json!({ "error": "seats already taken", "seats": taken }),
            ),
            CoreError::ShowtimeUnavailable => (
                StatusCode::CONFLICT,
                json!({ "error": "showtime is not open for booking" }),
            ),
            CoreError::PromotionInvalid(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": reason }),
            ),
            CoreError::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid signature" }),
            ),
            CoreError::InvalidTransition { from, to } => (
                StatusCode::CONFLICT,
                json!({ "error": format!("cannot move booking from {from} to {to}") }),
            ),
            CoreError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "error": "not allowed" }),
            ),
            CoreError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, json!({ "error": reason }))
            }
            CoreError::Storage(msg) => {
                tracing::error!("storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
