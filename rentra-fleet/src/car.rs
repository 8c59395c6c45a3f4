use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rentable vehicle in the fleet.
///
/// `available` is a derived flag: false iff at least one Pending or
/// Confirmed booking references the car. Only booking-lifecycle transactions
/// write it; it is never set directly from a client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub brand: String,
    pub daily_rate_minor: i64,
    pub capacity: i32,
    pub available: bool,
}

/// Admin add-car payload, validated before a `Car` is minted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCar {
    pub name: String,
    pub image: String,
    pub brand: String,
    pub daily_rate_minor: i64,
    pub capacity: i32,
}

impl NewCar {
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.name.trim().is_empty()
            || self.image.trim().is_empty()
            || self.brand.trim().is_empty()
        {
            return Err(FleetError::Validation(
                "All fields are required".to_string(),
            ));
        }
        if self.daily_rate_minor <= 0 {
            return Err(FleetError::Validation(
                "Daily rate must be positive".to_string(),
            ));
        }
        if self.capacity <= 0 {
            return Err(FleetError::Validation(
                "Capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and mint the catalog record. New cars start available.
    pub fn into_car(self) -> Result<Car, FleetError> {
        self.validate()?;
        Ok(Car {
            id: Uuid::new_v4(),
            name: self.name,
            image: self.image,
            brand: self.brand,
            daily_rate_minor: self.daily_rate_minor,
            capacity: self.capacity,
            available: true,
        })
    }
}

/// Fleet-related errors
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Car not found: {0}")]
    NotFound(Uuid),

    #[error("Storage unavailable: {0}")]
    Storage(String),
}
