use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rentra_booking::{BookingError, ReconcileError};
use rentra_core::StoreError;
use rentra_fleet::FleetError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Authentication(String),
    Authorization(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::Validation(msg),
            BookingError::InvalidDateRange(msg) => AppError::Validation(msg),
            BookingError::InvalidTransition { .. } => AppError::Validation(err.to_string()),
            BookingError::NotFound(msg) => AppError::NotFound(msg),
            BookingError::Conflict(msg) => AppError::Conflict(msg),
            BookingError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}

impl From<FleetError> for AppError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::Validation(msg) => AppError::Validation(msg),
            FleetError::NotFound(id) => AppError::NotFound(format!("car {id} not found")),
            FleetError::Storage(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("record not found".to_string()),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            // The response body never echoes signature detail.
            ReconcileError::Signature(_) => {
                AppError::Validation("webhook signature verification failed".to_string())
            }
            ReconcileError::MalformedEvent(msg) => AppError::Validation(msg),
            // 500 tells the provider to redeliver.
            ReconcileError::Storage(msg) => AppError::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
