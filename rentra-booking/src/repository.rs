use async_trait::async_trait;
use rentra_core::StoreResult;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus};

/// Persistence boundary for the booking ledger.
///
/// Mutating methods that also carry a `car_available` value must apply the
/// booking write and the car-flag write atomically (one transaction, or one
/// critical section for in-memory stores): the flag is a cache of the
/// active-booking set and a reader must never observe the two out of sync.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a booking and set its car's availability flag together.
    async fn insert(&self, booking: &Booking, car_available: bool) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn list_all(&self) -> StoreResult<Vec<Booking>>;

    async fn list_for_renter(&self, renter_id: Uuid) -> StoreResult<Vec<Booking>>;

    /// Bookings for a car with status in {Pending, Confirmed}.
    async fn active_for_car(&self, car_id: Uuid) -> StoreResult<Vec<Booking>>;

    /// Idempotency lookup by provider checkout-session id.
    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<Booking>>;

    /// Update a booking's status; when `car_available` is `Some`, write the
    /// car flag in the same transaction. `None` leaves the flag untouched.
    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        car_available: Option<bool>,
    ) -> StoreResult<Booking>;

    /// Remove a booking and set its car's availability flag together.
    async fn delete(&self, id: Uuid, car_available: bool) -> StoreResult<()>;
}
