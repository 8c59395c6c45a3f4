use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rentra_core::StoreError;
use rentra_fleet::{Car, FleetRepository};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{AvailabilityAction, Booking, BookingRequest, BookingStatus};
use crate::overlap::{self, DateRange};
use crate::profile::RenterProfile;
use crate::repository::BookingRepository;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => BookingError::NotFound("record not found".to_string()),
            StoreError::Conflict(msg) => BookingError::Conflict(msg),
            StoreError::Unavailable(msg) => BookingError::Unavailable(msg),
        }
    }
}

/// Outcome of a status change. `conflict_warning` is only set on the
/// Cancelled → Confirmed path when the booking's dates now overlap another
/// active booking: the status update still applies, the car flag is left
/// untouched, and the caller gets a non-fatal warning.
#[derive(Debug)]
pub struct StatusChange {
    pub booking: Booking,
    pub conflict_warning: Option<String>,
}

/// Outcome of payment reconciliation. `created == false` means the session
/// id was already materialized and the existing booking is returned.
#[derive(Debug)]
pub struct Confirmation {
    pub booking: Booking,
    pub created: bool,
}

/// Orchestrates booking creation, status transitions and deletion, keeping
/// the car availability flag consistent with the active-booking set.
///
/// Mutations are serialized per car id: checks and writes for one car run
/// inside its critical section, so two concurrent overlapping creates yield
/// exactly one success and one conflict. The store layer additionally pairs
/// each booking write with its flag write in one transaction.
pub struct BookingEngine {
    fleet: Arc<dyn FleetRepository>,
    bookings: Arc<dyn BookingRepository>,
    car_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl BookingEngine {
    pub fn new(fleet: Arc<dyn FleetRepository>, bookings: Arc<dyn BookingRepository>) -> Self {
        Self {
            fleet,
            bookings,
            car_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a Pending booking after the full validation and conflict
    /// gauntlet. The booking write and the flag write land together.
    pub async fn create(
        &self,
        renter_id: Uuid,
        request: &BookingRequest,
    ) -> Result<Booking, BookingError> {
        let (profile, range) = Self::validate(request)?;

        let _guard = self.lock_car(request.car_id).await;
        let car = self.require_car(request.car_id).await?;
        self.ensure_no_conflict(&car, &range).await?;

        let booking = Booking::pending(renter_id, request, profile);
        self.bookings.insert(&booking, false).await?;

        info!(booking_id = %booking.id, car_id = %car.id, "booking created");
        Ok(booking)
    }

    /// The creation gauntlet without the write: used by checkout-session
    /// creation, which must refuse unbookable requests before redirecting
    /// the customer to the payment provider.
    pub async fn check_bookable(&self, request: &BookingRequest) -> Result<Car, BookingError> {
        let (_, range) = Self::validate(request)?;
        let car = self.require_car(request.car_id).await?;
        self.ensure_no_conflict(&car, &range).await?;
        Ok(car)
    }

    /// Apply a status transition named by its literal string, updating the
    /// car flag per the transition table.
    pub async fn set_status(
        &self,
        id: Uuid,
        new_status: &str,
    ) -> Result<StatusChange, BookingError> {
        let current = self.require_booking(id).await?;
        let next: BookingStatus =
            new_status
                .parse()
                .map_err(|_| BookingError::InvalidTransition {
                    from: current.status.to_string(),
                    to: new_status.to_string(),
                })?;

        let _guard = self.lock_car(current.car_id).await;
        // Re-read inside the critical section; the status may have moved.
        let booking = self.require_booking(id).await?;
        let action =
            booking
                .status
                .transition_to(next)
                .ok_or_else(|| BookingError::InvalidTransition {
                    from: booking.status.to_string(),
                    to: next.to_string(),
                })?;

        let (flag, conflict_warning) = match action {
            AvailabilityAction::Keep => (None, None),
            AvailabilityAction::Occupy => (Some(false), None),
            AvailabilityAction::Release => {
                let others = self.bookings.active_for_car(booking.car_id).await?;
                let still_occupied = others.iter().any(|b| b.id != id);
                (Some(!still_occupied), None)
            }
            AvailabilityAction::Reoccupy => {
                if self.has_conflict(booking.car_id, &booking.range(), Some(id)).await? {
                    warn!(
                        booking_id = %id,
                        car_id = %booking.car_id,
                        "re-confirmed into overlapping dates; availability flag left unchanged"
                    );
                    let warning = "booking dates overlap another active booking; \
                                   car availability was not changed"
                        .to_string();
                    (None, Some(warning))
                } else {
                    (Some(false), None)
                }
            }
        };

        let updated = self.bookings.update_status(id, next, flag).await?;
        info!(booking_id = %id, status = %next, "booking status updated");
        Ok(StatusChange {
            booking: updated,
            conflict_warning,
        })
    }

    /// Hard-delete a booking from any status and recompute the car flag
    /// over the remaining active bookings.
    pub async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        let current = self.require_booking(id).await?;

        let _guard = self.lock_car(current.car_id).await;
        let booking = self.require_booking(id).await?;
        let others = self.bookings.active_for_car(booking.car_id).await?;
        let still_occupied = others.iter().any(|b| b.id != id);

        self.bookings.delete(id, !still_occupied).await?;
        info!(booking_id = %id, car_id = %booking.car_id, "booking deleted");
        Ok(())
    }

    /// Materialize a Confirmed booking from a completed checkout session,
    /// exactly once per session id.
    ///
    /// Date-past and overlap checks are not re-run here: the session
    /// endpoint ran them and the customer has already paid. The session-id
    /// lookup is the correctness backstop against at-least-once delivery.
    pub async fn confirm_from_payment(
        &self,
        renter_id: Uuid,
        request: &BookingRequest,
        session_id: &str,
        payment_reference: Option<String>,
    ) -> Result<Confirmation, BookingError> {
        if let Some(existing) = self.bookings.find_by_session(session_id).await? {
            return Ok(Confirmation {
                booking: existing,
                created: false,
            });
        }

        let profile = Self::parse_profile(request)?;
        DateRange::new(request.start_date, request.end_date)
            .map_err(|e| BookingError::InvalidDateRange(e.to_string()))?;

        let _guard = self.lock_car(request.car_id).await;
        // A concurrent redelivery may have won the race for the lock.
        if let Some(existing) = self.bookings.find_by_session(session_id).await? {
            return Ok(Confirmation {
                booking: existing,
                created: false,
            });
        }
        self.require_car(request.car_id).await?;

        let booking = Booking::confirmed_from_payment(
            renter_id,
            request,
            profile,
            session_id.to_string(),
            payment_reference,
        );
        match self.bookings.insert(&booking, false).await {
            Ok(()) => {}
            // A redelivery in another process can slip past the per-car
            // lock and lose the insert race on the session-id unique
            // constraint; that is still a duplicate, not a failure.
            Err(StoreError::Conflict(_)) => {
                if let Some(existing) = self.bookings.find_by_session(session_id).await? {
                    return Ok(Confirmation {
                        booking: existing,
                        created: false,
                    });
                }
                return Err(BookingError::Conflict(format!(
                    "booking for session {session_id} could not be stored"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!(booking_id = %booking.id, session_id, "booking confirmed from payment");
        Ok(Confirmation {
            booking,
            created: true,
        })
    }

    /// Full creation-time validation: profile formats, amount, method and
    /// date rules ("today" is the UTC calendar date).
    fn validate(request: &BookingRequest) -> Result<(RenterProfile, DateRange), BookingError> {
        let profile = Self::parse_profile(request)?;
        if request.amount_minor < 0 {
            return Err(BookingError::Validation(
                "payment amount must not be negative".to_string(),
            ));
        }
        if request.payment_method.trim().is_empty() {
            return Err(BookingError::Validation(
                "payment method is required".to_string(),
            ));
        }

        let range = DateRange::new(request.start_date, request.end_date)
            .map_err(|e| BookingError::InvalidDateRange(e.to_string()))?;
        if request.start_date < Utc::now().date_naive() {
            return Err(BookingError::InvalidDateRange(
                "start date must not be in the past".to_string(),
            ));
        }
        Ok((profile, range))
    }

    fn parse_profile(request: &BookingRequest) -> Result<RenterProfile, BookingError> {
        RenterProfile::parse(
            &request.customer_name,
            &request.father_name,
            &request.address,
            &request.national_id,
            &request.licence_number,
            &request.phone_number,
        )
        .map_err(|e| BookingError::Validation(e.to_string()))
    }

    /// Conflict gate for new bookings. An available car has no active
    /// bookings, so the overlap query is skipped for it; otherwise the
    /// overlap checker decides, which is what lets a range adjacent to an
    /// existing booking go through.
    async fn ensure_no_conflict(&self, car: &Car, range: &DateRange) -> Result<(), BookingError> {
        if !car.available && self.has_conflict(car.id, range, None).await? {
            return Err(BookingError::Conflict(format!(
                "car {} is already booked for the requested dates",
                car.id
            )));
        }
        Ok(())
    }

    async fn has_conflict(
        &self,
        car_id: Uuid,
        range: &DateRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, BookingError> {
        let active = self.bookings.active_for_car(car_id).await?;
        Ok(overlap::conflicts(
            range,
            active.iter().map(|b| (b.id, b.range())),
            exclude,
        ))
    }

    async fn require_car(&self, id: Uuid) -> Result<Car, BookingError> {
        self.fleet
            .get_car(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("car {id} not found")))
    }

    async fn require_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {id} not found")))
    }

    async fn lock_car(&self, car_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.car_locks.lock().await;
            locks
                .entry(car_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

