use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use rentra_booking::{BookingRequest, WebhookOutcome};
use rentra_core::payment::CheckoutRequest;
use rentra_core::Requester;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

/// POST /api/payment/create-checkout-session
///
/// Runs the same validation and conflict gauntlet as booking creation but
/// persists nothing; the request round-trips through the session metadata
/// and is materialized later by the webhook.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let car = state.engine.check_bookable(&request).await?;

    let metadata = request.to_metadata(requester.id);
    let checkout = CheckoutRequest {
        description: format!(
            "Car Rental Booking - {}, {} to {}",
            car.name, request.start_date, request.end_date
        ),
        product_name: car.name,
        amount_minor: request.amount_minor,
        currency: state.payment.currency.clone(),
        success_url: state.payment.success_url.clone(),
        cancel_url: state.payment.cancel_url.clone(),
        metadata: json!(metadata),
    };

    let session = state
        .gateway
        .create_checkout_session(&checkout)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(session_id = %session.id, car_id = %request.car_id, "checkout session created");
    Ok(Json(CheckoutResponse {
        url: session.url,
        session_id: session.id,
    }))
}

/// POST /api/payment/webhook
///
/// Raw-body receiver for the payment provider. The signature is verified
/// over the raw bytes before anything is parsed.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = state.reconciler.handle(&body, signature).await?;

    let response = match outcome {
        WebhookOutcome::SessionCompleted { booking_id, .. } => {
            json!({ "received": true, "booking_id": booking_id })
        }
        WebhookOutcome::Acknowledged { .. } => json!({ "received": true }),
    };
    Ok(Json(response))
}
