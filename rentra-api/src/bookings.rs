use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rentra_booking::{Booking, BookingRequest};
use rentra_core::Requester;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub booking: Booking,
    /// Non-fatal conflict notice from a Cancelled → Confirmed transition
    /// whose dates now overlap another active booking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.engine.create(requester.id, &request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /api/bookings/my-bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_renter(requester.id).await?))
}

/// GET /api/admin/bookings
pub async fn list_all_bookings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_all().await?))
}

/// PUT /api/bookings/{id}/status
pub async fn set_booking_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let change = state.engine.set_status(id, &request.status).await?;
    Ok(Json(StatusResponse {
        booking: change.booking,
        warning: change.conflict_warning,
    }))
}

/// DELETE /api/bookings/{id}
pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.engine.delete(id).await?;
    Ok(Json(json!({ "deleted": true })))
}
