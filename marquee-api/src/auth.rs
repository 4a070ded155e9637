use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::state::AppState;
use marquee_core::CoreError;

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/guest", post(login_guest))
}

/// Mint a token with the given subject and role.
pub fn issue_token(
    secret: &str,
    sub: &str,
    role: &str,
    ttl_seconds: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::seconds(ttl_seconds as i64)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Anonymous session used by the storefront before checkout collects
/// contact details.
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, ApiError> {
    let sub = format!("guest-{}", Uuid::new_v4());
    let token = issue_token(
        &state.auth.secret,
        &sub,
        "CUSTOMER",
        state.auth.expiration,
    )
    .map_err(|err| CoreError::Storage(format!("token encoding failed: {err}")))?;

    Ok(Json(AuthResponse { token }))
}
