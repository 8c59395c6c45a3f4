use std::collections::BTreeMap;
use std::sync::Arc;

use rentra_core::webhook::{SignatureError, WebhookVerifier};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{BookingEngine, BookingError};
use crate::models::BookingRequest;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The notification failed authentication; the payload was not parsed.
    #[error("webhook signature verification failed")]
    Signature(#[from] SignatureError),

    /// The payload is undecodable or its metadata cannot be rebuilt into a
    /// valid booking request. Terminal: retrying the same payload cannot
    /// succeed.
    #[error("malformed webhook event: {0}")]
    MalformedEvent(String),

    /// Persistence failed; safe for the provider to redeliver, the session
    /// idempotency check absorbs the retry.
    #[error("storage failure while reconciling: {0}")]
    Storage(String),
}

/// What a handled notification did.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// A completed checkout session was materialized (or found already
    /// materialized) as a Confirmed booking.
    SessionCompleted { booking_id: Uuid, created: bool },
    /// Any other event kind: acknowledged without touching booking state.
    Acknowledged { kind: String },
}

/// Provider event envelope: `{ id, type, data: { object } }`.
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Turns payment-completion notifications into Confirmed bookings, exactly
/// once per checkout session.
///
/// The signature is verified over the raw request bytes before anything is
/// parsed; a payload that fails verification is never looked at.
pub struct PaymentReconciler {
    verifier: WebhookVerifier,
    engine: Arc<BookingEngine>,
}

impl PaymentReconciler {
    pub fn new(verifier: WebhookVerifier, engine: Arc<BookingEngine>) -> Self {
        Self { verifier, engine }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, ReconcileError> {
        self.verifier.verify(signature_header, payload)?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ReconcileError::MalformedEvent(e.to_string()))?;

        match event.kind.as_str() {
            "checkout.session.completed" => self.complete_session(&event).await,
            "payment_intent.succeeded" | "payment_intent.payment_failed" => {
                info!(event_id = %event.id, kind = %event.kind, "payment event acknowledged");
                Ok(WebhookOutcome::Acknowledged { kind: event.kind })
            }
            _ => {
                warn!(event_id = %event.id, kind = %event.kind, "unhandled webhook event kind");
                Ok(WebhookOutcome::Acknowledged { kind: event.kind })
            }
        }
    }

    async fn complete_session(
        &self,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, ReconcileError> {
        let session = &event.data.object;
        let (renter_id, request) = BookingRequest::from_metadata(&session.metadata)
            .map_err(|e| ReconcileError::MalformedEvent(e.to_string()))?;

        let confirmation = self
            .engine
            .confirm_from_payment(
                renter_id,
                &request,
                &session.id,
                session.payment_intent.clone(),
            )
            .await
            .map_err(|e| match e {
                BookingError::Unavailable(msg) => ReconcileError::Storage(msg),
                // Bad metadata or a vanished car cannot heal on retry.
                other => ReconcileError::MalformedEvent(other.to_string()),
            })?;

        if confirmation.created {
            info!(
                event_id = %event.id,
                session_id = %session.id,
                booking_id = %confirmation.booking.id,
                "checkout session materialized as confirmed booking"
            );
        } else {
            info!(
                event_id = %event.id,
                session_id = %session.id,
                booking_id = %confirmation.booking.id,
                "duplicate checkout notification ignored"
            );
        }

        Ok(WebhookOutcome::SessionCompleted {
            booking_id: confirmation.booking.id,
            created: confirmation.created,
        })
    }
}

