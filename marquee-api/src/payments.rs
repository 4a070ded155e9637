use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use marquee_booking::BookingStatus;
use marquee_core::payment::PaymentGateway;
use marquee_core::CoreError;
use marquee_pay::IpnPayload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/momo/create", post(create_payment))
}

/// The IPN endpoint is unauthenticated; the HMAC signature is the
/// authentication.
pub fn callback_routes() -> Router<AppState> {
    Router::new().route("/momo/ipn", post(handle_ipn))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest {
    booking_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentResponse {
    pay_url: String,
    transaction_ref: String,
}

async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    let booking = state.manager.get(&claims.actor(), req.booking_id).await?;
    if booking.status != BookingStatus::Pending {
        return Err(CoreError::InvalidTransition {
            from: booking.status.as_str().into(),
            to: "PAYMENT".into(),
        }
        .into());
    }

    let redirect = state
        .gateway
        .create_payment(booking.id, booking.total_amount, "Cinema tickets")
        .await
        .map_err(|err| anyhow::anyhow!("payment gateway: {err}"))?;

    state
        .manager
        .attach_transaction_ref(booking.id, &redirect.transaction_ref)
        .await?;

    Ok(Json(CreatePaymentResponse {
        pay_url: redirect.pay_url,
        transaction_ref: redirect.transaction_ref,
    }))
}

/// The order id lodged with the provider is "{booking_id}-{millis}".
fn booking_id_from_order(order_id: &str) -> Result<Uuid, CoreError> {
    order_id
        .rsplit_once('-')
        .map(|(prefix, _)| prefix)
        .and_then(|prefix| Uuid::parse_str(prefix).ok())
        .ok_or_else(|| CoreError::Validation(format!("malformed order id {order_id}")))
}

async fn handle_ipn(
    State(state): State<AppState>,
    Json(payload): Json<IpnPayload>,
) -> Result<StatusCode, ApiError> {
    state.verifier.verify(&payload)?;

    let booking_id = booking_id_from_order(&payload.order_id)?;
    if payload.is_success() {
        state
            .manager
            .confirm_payment(booking_id, &payload.order_id)
            .await?;
    } else {
        tracing::info!(
            order_id = %payload.order_id,
            result_code = payload.result_code,
            "payment failed at provider"
        );
        state.manager.fail_payment(booking_id).await?;
    }

    // The provider only needs an acknowledgement
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_round_trips_the_booking_id() {
        let booking_id = Uuid::new_v4();
        let order_id = format!("{}-{}", booking_id, 1714000000123i64);
        assert_eq!(booking_id_from_order(&order_id).unwrap(), booking_id);
    }

    #[test]
    fn malformed_order_id_is_rejected() {
        assert!(booking_id_from_order("not-a-uuid").is_err());
        assert!(booking_id_from_order("").is_err());
    }
}
