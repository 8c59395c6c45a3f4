use axum::{
    http::Method,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod cars;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/cars", get(cars::list_cars))
        // Signature-authenticated, not token-authenticated.
        .route("/api/payment/webhook", post(payments::payment_webhook));

    let customer = Router::new()
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/my-bookings", get(bookings::my_bookings))
        .route(
            "/api/payment/create-checkout-session",
            post(payments::create_checkout_session),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::customer_auth_middleware,
        ));

    let admin = Router::new()
        .route("/api/admin/cars", post(cars::add_car))
        .route("/api/admin/bookings", get(bookings::list_all_bookings))
        .route("/api/bookings/{id}/status", put(bookings::set_booking_status))
        .route("/api/bookings/{id}", delete(bookings::delete_booking))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
