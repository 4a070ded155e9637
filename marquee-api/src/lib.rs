use axum::{http::Method, middleware::from_fn_with_state, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bookings;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod showtimes;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer_auth = from_fn_with_state(
        state.clone(),
        middleware::auth::customer_auth_middleware,
    );
    let admin_auth = from_fn_with_state(state.clone(), middleware::auth::admin_auth_middleware);

    Router::new()
        .nest("/v1/auth", auth::routes())
        .nest(
            "/v1/bookings",
            bookings::routes().layer(customer_auth.clone()),
        )
        .nest(
            "/v1/payments",
            payments::routes().layer(customer_auth.clone()),
        )
        // Provider callbacks authenticate via signature, not JWT
        .nest("/v1/payments", payments::callback_routes())
        .nest(
            "/v1/showtimes",
            showtimes::routes().layer(customer_auth),
        )
        .nest("/v1", showtimes::admin_routes().layer(admin_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
