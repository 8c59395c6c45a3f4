use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rentra_booking::{Booking, BookingRepository, BookingStatus, RenterProfile};
use rentra_core::{StoreError, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::fleet_repo::map_sqlx;

/// Postgres booking ledger. Every method that also carries a car-flag value
/// applies the booking write and the `cars.available` write in one
/// transaction, so no reader can observe the pair out of sync.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    renter_id: Uuid,
    car_id: Uuid,
    customer_name: String,
    father_name: String,
    address: String,
    national_id: String,
    licence_number: String,
    phone_number: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    amount_minor: i64,
    payment_method: String,
    checkout_session_id: Option<String>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    /// Rows only ever hold values that passed write-time validation, so a
    /// failure here means the table was edited out of band.
    fn into_booking(self) -> StoreResult<Booking> {
        let id = self.id;
        let profile = RenterProfile::parse(
            &self.customer_name,
            &self.father_name,
            &self.address,
            &self.national_id,
            &self.licence_number,
            &self.phone_number,
        )
        .map_err(|e| StoreError::Unavailable(format!("corrupt booking row {id}: {e}")))?;
        let status: BookingStatus = self
            .status
            .parse()
            .map_err(|_| {
                StoreError::Unavailable(format!(
                    "corrupt booking row {id}: unknown status '{}'",
                    self.status
                ))
            })?;

        Ok(Booking {
            id: self.id,
            renter_id: self.renter_id,
            car_id: self.car_id,
            profile,
            start_date: self.start_date,
            end_date: self.end_date,
            status,
            amount_minor: self.amount_minor,
            payment_method: self.payment_method,
            checkout_session_id: self.checkout_session_id,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, renter_id, car_id, customer_name, father_name, address, \
     national_id, licence_number, phone_number, start_date, end_date, status, amount_minor, \
     payment_method, checkout_session_id, payment_reference, created_at, updated_at";

#[async_trait]
impl BookingRepository for PgBookingStore {
    async fn insert(&self, booking: &Booking, car_available: bool) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            "INSERT INTO bookings (id, renter_id, car_id, customer_name, father_name, address, \
             national_id, licence_number, phone_number, start_date, end_date, status, \
             amount_minor, payment_method, checkout_session_id, payment_reference, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(booking.id)
        .bind(booking.renter_id)
        .bind(booking.car_id)
        .bind(&booking.profile.customer_name)
        .bind(&booking.profile.father_name)
        .bind(&booking.profile.address)
        .bind(booking.profile.national_id.as_str())
        .bind(booking.profile.licence_number.as_str())
        .bind(booking.profile.phone_number.as_str())
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.status.as_str())
        .bind(booking.amount_minor)
        .bind(&booking.payment_method)
        .bind(&booking.checkout_session_id)
        .bind(&booking.payment_reference)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let updated = sqlx::query("UPDATE cars SET available = $1 WHERE id = $2")
            .bind(car_available)
            .bind(booking.car_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn list_for_renter(&self, renter_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE renter_id = $1 ORDER BY created_at DESC"
        ))
        .bind(renter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn active_for_car(&self, car_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE car_id = $1 AND status IN ('Pending', 'Confirmed')"
        ))
        .bind(car_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE checkout_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        car_available: Option<bool>,
    ) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound)?;

        if let Some(available) = car_available {
            sqlx::query("UPDATE cars SET available = $1 WHERE id = $2")
                .bind(available)
                .bind(row.car_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        row.into_booking()
    }

    async fn delete(&self, id: Uuid, car_available: bool) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let car_id: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM bookings WHERE id = $1 RETURNING car_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        let (car_id,) = car_id.ok_or(StoreError::NotFound)?;

        sqlx::query("UPDATE cars SET available = $1 WHERE id = $2")
            .bind(car_available)
            .bind(car_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)
    }
}
