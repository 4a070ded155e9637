use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use marquee_api::state::{AppState, AuthConfig};
use marquee_api::{app, auth::issue_token};
use marquee_booking::{BookingManager, MemoryBookingRepository};
use marquee_catalog::{MemorySeatLocks, MemoryShowtimeCatalog};
use marquee_pay::{CallbackVerifier, IpnPayload, MockGateway};
use marquee_promo::{
    MemoryPromotionRepository, Promotion, PromotionEngine, PromotionKind, PromotionRepository,
};
use marquee_store::app_config::BusinessRules;
use marquee_store::BroadcastNotifier;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "test-secret";
const ACCESS_KEY: &str = "access";
const SECRET_KEY: &str = "secret";

async fn test_app() -> Router {
    let bookings = Arc::new(MemoryBookingRepository::new());
    let showtimes = Arc::new(MemoryShowtimeCatalog::new());
    let locks = Arc::new(MemorySeatLocks::new());
    let promo_repo = Arc::new(MemoryPromotionRepository::new());
    let promotions = Arc::new(PromotionEngine::new(promo_repo.clone()));

    let now = chrono::Utc::now();
    let save10 = Promotion::new(
        "SAVE10",
        "Ten percent off",
        PromotionKind::Percentage,
        10,
        now - chrono::Duration::days(1),
        now + chrono::Duration::days(1),
    )
    .unwrap()
    .with_max_discount(300);
    promo_repo.insert(&save10).await.unwrap();

    let notifier = BroadcastNotifier::new(16);
    let events = notifier.sender();

    let manager = Arc::new(BookingManager::new(
        bookings.clone(),
        showtimes.clone(),
        locks.clone(),
        promotions.clone(),
        Arc::new(notifier),
    ));

    let state = AppState {
        manager,
        bookings,
        showtimes,
        locks,
        promotions,
        promo_repo,
        gateway: Arc::new(MockGateway),
        verifier: CallbackVerifier::new(ACCESS_KEY, SECRET_KEY),
        events,
        auth: AuthConfig {
            secret: JWT_SECRET.into(),
            expiration: 3600,
        },
        business_rules: BusinessRules {
            booking_expiry_minutes: 15,
            seat_hold_seconds: 900,
            sweep_interval_seconds: 60,
            promo_refresh_seconds: 300,
        },
    };
    app(state)
}

fn bearer(role: &str, sub: &str) -> String {
    let token = issue_token(JWT_SECRET, sub, role, 3600).unwrap();
    format!("Bearer {token}")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, auth: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_authed(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

/// Schedule a showtime and two seats, returning (showtime_id, seat_ids).
async fn seed_showtime(app: &Router) -> (Uuid, Vec<Uuid>) {
    let admin = bearer("ADMIN", "ops");
    let room_id = Uuid::new_v4();
    let starts = chrono::Utc::now() + chrono::Duration::hours(3);

    let (status, showtime) = send(
        app,
        post_json(
            "/v1/showtimes",
            &admin,
            json!({
                "movieId": Uuid::new_v4(),
                "cinemaId": Uuid::new_v4(),
                "roomId": room_id,
                "startsAt": starts,
                "endsAt": starts + chrono::Duration::hours(2),
                "basePrice": 1000,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let showtime_id: Uuid = showtime["id"].as_str().unwrap().parse().unwrap();

    let (status, seats) = send(
        app,
        post_json(
            &format!("/v1/rooms/{room_id}/seats"),
            &admin,
            json!([
                { "row": 1, "column": 1, "kind": "STANDARD", "price": 1000 },
                { "row": 1, "column": 2, "kind": "VIP", "price": 1500 },
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let seat_ids: Vec<Uuid> = seats
        .as_array()
        .unwrap()
        .iter()
        .map(|seat| seat["id"].as_str().unwrap().parse().unwrap())
        .collect();

    (showtime_id, seat_ids)
}

fn signed_ipn(verifier: &CallbackVerifier, order_id: &str, result_code: i64) -> Value {
    let mut payload = IpnPayload {
        partner_code: "MARQUEE".into(),
        order_id: order_id.into(),
        request_id: "req-1".into(),
        amount: 2250,
        order_info: "Cinema tickets".into(),
        order_type: "momo_wallet".into(),
        trans_id: 1122334455,
        result_code,
        message: "ok".into(),
        pay_type: "qr".into(),
        response_time: 1714000000123,
        extra_data: String::new(),
        signature: String::new(),
    };
    payload.signature = verifier.sign(&payload).unwrap();
    serde_json::to_value(payload).unwrap()
}

#[tokio::test]
async fn guest_token_grants_access() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/auth/guest")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        get_authed("/v1/bookings", &format!("Bearer {token}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_booking_requests_are_rejected() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/v1/bookings")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customers_cannot_use_admin_routes() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        post_json("/v1/showtimes", &bearer("CUSTOMER", "alice"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn booking_flow_from_hold_to_confirmation() {
    let app = test_app().await;
    let (showtime_id, seat_ids) = seed_showtime(&app).await;
    let alice = bearer("CUSTOMER", "alice");

    // Book both seats with the promotion: $25.00 -> $22.50
    let (status, booking) = send(
        &app,
        post_json(
            "/v1/bookings",
            &alice,
            json!({
                "showtimeId": showtime_id,
                "seatIds": seat_ids,
                "paymentMethod": "MOMO",
                "promotionCode": "save10",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "PENDING");
    assert_eq!(booking["totalAmount"], 2250);
    assert_eq!(booking["discountAmount"], 250);
    let booking_id = booking["id"].as_str().unwrap().to_string();

    // A second customer wanting an overlapping seat gets a conflict
    let (status, conflict) = send(
        &app,
        post_json(
            "/v1/bookings",
            &bearer("CUSTOMER", "bob"),
            json!({
                "showtimeId": showtime_id,
                "seatIds": [seat_ids[0]],
                "paymentMethod": "CASH",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        conflict["seats"].as_array().unwrap()[0].as_str().unwrap(),
        seat_ids[0].to_string()
    );

    // The seat map shows both seats as unavailable
    let (status, seats) = send(
        &app,
        get_authed(&format!("/v1/showtimes/{showtime_id}/seats"), &alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(seats
        .as_array()
        .unwrap()
        .iter()
        .all(|seat| seat["available"] == false));

    // Start the payment
    let (status, payment) = send(
        &app,
        post_json(
            "/v1/payments/momo/create",
            &alice,
            json!({ "bookingId": booking_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(payment["payUrl"].as_str().unwrap().starts_with("https://"));

    // A tampered callback is rejected before touching the booking
    let verifier = CallbackVerifier::new(ACCESS_KEY, SECRET_KEY);
    let order_id = format!("{booking_id}-1714000000000");
    let mut forged = signed_ipn(&verifier, &order_id, 0);
    forged["amount"] = json!(1);
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/payments/momo/ipn")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(forged.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The genuine callback confirms the booking
    let genuine = signed_ipn(&verifier, &order_id, 0);
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/payments/momo/ipn")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(genuine.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Replay of the same callback is acknowledged without double effect
    let replay = signed_ipn(&verifier, &order_id, 0);
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/payments/momo/ipn")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(replay.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, booking) = send(
        &app,
        get_authed(&format!("/v1/bookings/{booking_id}"), &alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(booking["paymentState"], "PAID");
}

#[tokio::test]
async fn failed_payment_callback_cancels_and_frees_seats() {
    let app = test_app().await;
    let (showtime_id, seat_ids) = seed_showtime(&app).await;
    let alice = bearer("CUSTOMER", "alice");

    let (_, booking) = send(
        &app,
        post_json(
            "/v1/bookings",
            &alice,
            json!({
                "showtimeId": showtime_id,
                "seatIds": seat_ids,
                "paymentMethod": "MOMO",
            }),
        ),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let verifier = CallbackVerifier::new(ACCESS_KEY, SECRET_KEY);
    let order_id = format!("{booking_id}-1714000000000");
    let failed = signed_ipn(&verifier, &order_id, 1006);
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/payments/momo/ipn")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(failed.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, booking) = send(
        &app,
        get_authed(&format!("/v1/bookings/{booking_id}"), &alice),
    )
    .await;
    assert_eq!(booking["status"], "CANCELLED");
    assert_eq!(booking["paymentState"], "FAILED");

    // Seats are bookable again
    let (status, _) = send(
        &app,
        post_json(
            "/v1/bookings",
            &bearer("CUSTOMER", "bob"),
            json!({
                "showtimeId": showtime_id,
                "seatIds": seat_ids,
                "paymentMethod": "CASH",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn invalid_promotion_code_is_unprocessable() {
    let app = test_app().await;
    let (showtime_id, seat_ids) = seed_showtime(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            "/v1/bookings",
            &bearer("CUSTOMER", "alice"),
            json!({
                "showtimeId": showtime_id,
                "seatIds": seat_ids,
                "paymentMethod": "MOMO",
                "promotionCode": "NOSUCHCODE",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());

    // The failed attempt left no holds behind
    let (_, seats) = send(
        &app,
        get_authed(
            &format!("/v1/showtimes/{showtime_id}/seats"),
            &bearer("CUSTOMER", "alice"),
        ),
    )
    .await;
    assert!(seats
        .as_array()
        .unwrap()
        .iter()
        .all(|seat| seat["available"] == true));
}

#[tokio::test]
async fn cancelling_someone_elses_booking_is_forbidden() {
    let app = test_app().await;
    let (showtime_id, seat_ids) = seed_showtime(&app).await;

    let (_, booking) = send(
        &app,
        post_json(
            "/v1/bookings",
            &bearer("CUSTOMER", "alice"),
            json!({
                "showtimeId": showtime_id,
                "seatIds": seat_ids,
                "paymentMethod": "CASH",
            }),
        ),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/bookings/{booking_id}"))
            .header(header::AUTHORIZATION, bearer("CUSTOMER", "mallory"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The owner can cancel
    let (status, cancelled) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/bookings/{booking_id}"))
            .header(header::AUTHORIZATION, bearer("CUSTOMER", "alice"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
}

#[tokio::test]
async fn deleting_a_room_cascades_to_showtimes() {
    let app = test_app().await;
    let admin = bearer("ADMIN", "ops");
    let (showtime_id, _) = seed_showtime(&app).await;

    let (_, showtime) = send(
        &app,
        get_authed(&format!("/v1/showtimes/{showtime_id}"), &admin),
    )
    .await;
    let room_id = showtime["roomId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/rooms/{room_id}"))
            .header(header::AUTHORIZATION, admin.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["removedShowtimes"].as_array().unwrap()[0]
            .as_str()
            .unwrap(),
        showtime_id.to_string()
    );

    let (status, _) = send(
        &app,
        get_authed(&format!("/v1/showtimes/{showtime_id}"), &admin),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
