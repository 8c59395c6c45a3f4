use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::overlap::DateRange;
use crate::profile::RenterProfile;

/// Booking status in the lifecycle. Serialized as the literal strings
/// `"Pending"`, `"Confirmed"`, `"Cancelled"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// What a status transition does to the car's availability flag. Every
/// handler funnels through this one table instead of flipping the flag
/// ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityAction {
    /// Leave the flag untouched (same-status no-op).
    Keep,
    /// Set the flag to unavailable (idempotent for Pending → Confirmed).
    Occupy,
    /// Recompute the flag from the remaining active bookings.
    Release,
    /// Re-confirmation out of Cancelled: re-check overlaps first; on a
    /// clear range occupy, on a conflict keep the flag and warn.
    Reoccupy,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Pending and Confirmed bookings occupy their car.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// The transition table. `None` means the transition is not recognized
    /// (the only unreachable edges are Confirmed → Pending and
    /// Cancelled → Pending). Same-status transitions are accepted as
    /// no-ops so admin retries stay idempotent.
    pub fn transition_to(&self, next: BookingStatus) -> Option<AvailabilityAction> {
        use BookingStatus::*;
        match (*self, next) {
            (a, b) if a == b => Some(AvailabilityAction::Keep),
            (Pending, Confirmed) => Some(AvailabilityAction::Occupy),
            (Pending, Cancelled) | (Confirmed, Cancelled) => Some(AvailabilityAction::Release),
            (Cancelled, Confirmed) => Some(AvailabilityAction::Reoccupy),
            _ => None,
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(BookingStatus::Pending),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation in the ledger, linking a renter, a car, a half-open date
/// range and a lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub renter_id: Uuid,
    pub car_id: Uuid,
    #[serde(flatten)]
    pub profile: RenterProfile,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub amount_minor: i64,
    pub payment_method: String,
    /// Provider checkout-session id; present only for bookings created by
    /// payment reconciliation. Idempotency key for webhook delivery.
    pub checkout_session_id: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Mint a Pending booking from a validated request.
    pub fn pending(renter_id: Uuid, request: &BookingRequest, profile: RenterProfile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            renter_id,
            car_id: request.car_id,
            profile,
            start_date: request.start_date,
            end_date: request.end_date,
            status: BookingStatus::Pending,
            amount_minor: request.amount_minor,
            payment_method: request.payment_method.clone(),
            checkout_session_id: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mint a Confirmed booking from a completed checkout session,
    /// bypassing Pending.
    pub fn confirmed_from_payment(
        renter_id: Uuid,
        request: &BookingRequest,
        profile: RenterProfile,
        session_id: String,
        payment_reference: Option<String>,
    ) -> Self {
        let mut booking = Self::pending(renter_id, request, profile);
        booking.status = BookingStatus::Confirmed;
        booking.checkout_session_id = Some(session_id);
        booking.payment_reference = payment_reference;
        booking
    }

    pub fn range(&self) -> DateRange {
        DateRange::unchecked(self.start_date, self.end_date)
    }
}

/// The creation payload as submitted by a customer. Profile fields arrive
/// as raw strings and are validated into a [`RenterProfile`] by the engine.
///
/// This struct round-trips through the payment provider's session metadata
/// (string → string), so reconciliation can rebuild the booking after the
/// checkout completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub car_id: Uuid,
    pub customer_name: String,
    pub father_name: String,
    pub address: String,
    pub national_id: String,
    pub licence_number: String,
    pub phone_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_minor: i64,
    pub payment_method: String,
}

#[derive(Debug, thiserror::Error)]
#[error("metadata field '{0}' is missing or malformed")]
pub struct MetadataError(pub &'static str);

impl BookingRequest {
    /// Flatten the request (plus the requester id) into the string map the
    /// payment provider attaches to its checkout session.
    pub fn to_metadata(&self, renter_id: Uuid) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("renter_id".into(), renter_id.to_string());
        map.insert("car_id".into(), self.car_id.to_string());
        map.insert("customer_name".into(), self.customer_name.clone());
        map.insert("father_name".into(), self.father_name.clone());
        map.insert("address".into(), self.address.clone());
        map.insert("national_id".into(), self.national_id.clone());
        map.insert("licence_number".into(), self.licence_number.clone());
        map.insert("phone_number".into(), self.phone_number.clone());
        map.insert("start_date".into(), self.start_date.to_string());
        map.insert("end_date".into(), self.end_date.to_string());
        map.insert("amount_minor".into(), self.amount_minor.to_string());
        map.insert("payment_method".into(), self.payment_method.clone());
        map
    }

    /// Rebuild the request from session metadata echoed back by the
    /// provider. The inverse of [`to_metadata`](Self::to_metadata).
    pub fn from_metadata(
        metadata: &BTreeMap<String, String>,
    ) -> Result<(Uuid, Self), MetadataError> {
        fn field<'a>(
            metadata: &'a BTreeMap<String, String>,
            key: &'static str,
        ) -> Result<&'a str, MetadataError> {
            metadata.get(key).map(String::as_str).ok_or(MetadataError(key))
        }

        let renter_id = Uuid::parse_str(field(metadata, "renter_id")?)
            .map_err(|_| MetadataError("renter_id"))?;
        let car_id =
            Uuid::parse_str(field(metadata, "car_id")?).map_err(|_| MetadataError("car_id"))?;
        let start_date = field(metadata, "start_date")?
            .parse::<NaiveDate>()
            .map_err(|_| MetadataError("start_date"))?;
        let end_date = field(metadata, "end_date")?
            .parse::<NaiveDate>()
            .map_err(|_| MetadataError("end_date"))?;
        let amount_minor = field(metadata, "amount_minor")?
            .parse::<i64>()
            .map_err(|_| MetadataError("amount_minor"))?;

        Ok((
            renter_id,
            Self {
                car_id,
                customer_name: field(metadata, "customer_name")?.to_string(),
                father_name: field(metadata, "father_name")?.to_string(),
                address: field(metadata, "address")?.to_string(),
                national_id: field(metadata, "national_id")?.to_string(),
                licence_number: field(metadata, "licence_number")?.to_string(),
                phone_number: field(metadata, "phone_number")?.to_string(),
                start_date,
                end_date,
                amount_minor,
                payment_method: field(metadata, "payment_method")?.to_string(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request() -> BookingRequest {
        BookingRequest {
            car_id: Uuid::new_v4(),
            customer_name: "Ayesha Khan".to_string(),
            father_name: "Imran Khan".to_string(),
            address: "12 Canal Road, Lahore".to_string(),
            national_id: "3520212345678".to_string(),
            licence_number: "352021234567890".to_string(),
            phone_number: "03001234567".to_string(),
            start_date: NaiveDate::from_ymd_opt(2099, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2099, 6, 5).unwrap(),
            amount_minor: 60_000,
            payment_method: "card".to_string(),
        }
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use AvailabilityAction::*;
        use BookingStatus::*;

        assert_eq!(Pending.transition_to(Confirmed), Some(Occupy));
        assert_eq!(Pending.transition_to(Cancelled), Some(Release));
        assert_eq!(Confirmed.transition_to(Cancelled), Some(Release));
        assert_eq!(Cancelled.transition_to(Confirmed), Some(Reoccupy));

        // Same-status retries are no-ops.
        assert_eq!(Confirmed.transition_to(Confirmed), Some(Keep));
        assert_eq!(Cancelled.transition_to(Cancelled), Some(Keep));

        // Nothing goes back to Pending.
        assert_eq!(Confirmed.transition_to(Pending), None);
        assert_eq!(Cancelled.transition_to(Pending), None);
    }

    #[test]
    fn status_round_trips_through_literals() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("PENDING".parse::<BookingStatus>().is_err());
        assert!("Completed".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn metadata_round_trip_preserves_the_request() {
        let renter = Uuid::new_v4();
        let original = request();

        let metadata = original.to_metadata(renter);
        let (rebuilt_renter, rebuilt) = BookingRequest::from_metadata(&metadata).unwrap();

        assert_eq!(rebuilt_renter, renter);
        assert_eq!(rebuilt.car_id, original.car_id);
        assert_eq!(rebuilt.start_date, original.start_date);
        assert_eq!(rebuilt.end_date, original.end_date);
        assert_eq!(rebuilt.amount_minor, original.amount_minor);
        assert_eq!(rebuilt.national_id, original.national_id);
    }

    #[test]
    fn metadata_missing_field_names_the_culprit() {
        let mut metadata = request().to_metadata(Uuid::new_v4());
        metadata.remove("start_date");

        let err = BookingRequest::from_metadata(&metadata).unwrap_err();
        assert!(err.to_string().contains("start_date"));
    }
}
