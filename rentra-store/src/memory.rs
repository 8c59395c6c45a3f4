use async_trait::async_trait;
use chrono::Utc;
use rentra_booking::{Booking, BookingRepository, BookingStatus};
use rentra_core::{StoreError, StoreResult};
use rentra_fleet::{Car, FleetRepository};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    cars: HashMap<Uuid, Car>,
    bookings: HashMap<Uuid, Booking>,
}

/// In-memory store backing tests and local development. Implements both
/// repository traits over one state map, so paired booking + car-flag
/// writes happen under a single write guard.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }
}

#[async_trait]
impl FleetRepository for MemoryStore {
    async fn insert_car(&self, car: &Car) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.cars.contains_key(&car.id) {
            return Err(StoreError::Conflict(format!("car {} already exists", car.id)));
        }
        inner.cars.insert(car.id, car.clone());
        Ok(())
    }

    async fn get_car(&self, id: Uuid) -> StoreResult<Option<Car>> {
        Ok(self.read()?.cars.get(&id).cloned())
    }

    async fn list_cars(&self) -> StoreResult<Vec<Car>> {
        let mut cars: Vec<Car> = self.read()?.cars.values().cloned().collect();
        cars.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cars)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert(&self, booking: &Booking, car_available: bool) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        if let Some(session_id) = &booking.checkout_session_id {
            if inner
                .bookings
                .values()
                .any(|b| b.checkout_session_id.as_deref() == Some(session_id))
            {
                return Err(StoreError::Conflict(format!(
                    "checkout session {session_id} already materialized"
                )));
            }
        }
        let car = inner
            .cars
            .get_mut(&booking.car_id)
            .ok_or(StoreError::NotFound)?;
        car.available = car_available;
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.read()?.bookings.get(&id).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.read()?.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_for_renter(&self, renter_id: Uuid) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .read()?
            .bookings
            .values()
            .filter(|b| b.renter_id == renter_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn active_for_car(&self, car_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(self
            .read()?
            .bookings
            .values()
            .filter(|b| b.car_id == car_id && b.status.is_active())
            .cloned()
            .collect())
    }

    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<Booking>> {
        Ok(self
            .read()?
            .bookings
            .values()
            .find(|b| b.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        car_available: Option<bool>,
    ) -> StoreResult<Booking> {
        let mut inner = self.write()?;
        let car_id = inner
            .bookings
            .get(&id)
            .map(|b| b.car_id)
            .ok_or(StoreError::NotFound)?;
        // Resolve the car before touching the booking so a failed lookup
        // leaves no partial write behind.
        if let Some(available) = car_available {
            let car = inner.cars.get_mut(&car_id).ok_or(StoreError::NotFound)?;
            car.available = available;
        }
        let booking = inner.bookings.get_mut(&id).ok_or(StoreError::NotFound)?;
        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn delete(&self, id: Uuid, car_available: bool) -> StoreResult<()> {
        let mut inner = self.write()?;
        let booking = inner.bookings.remove(&id).ok_or(StoreError::NotFound)?;
        let car = inner
            .cars
            .get_mut(&booking.car_id)
            .ok_or(StoreError::NotFound)?;
        car.available = car_available;
        Ok(())
    }
}
