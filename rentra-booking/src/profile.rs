use rentra_shared::Masked;
use serde::{Deserialize, Serialize};

/// Profile field validation failures, surfaced at write time so malformed
/// documents never reach the ledger.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be exactly {len} digits")]
    BadFormat { field: &'static str, len: usize },
}

fn validate_digits(value: &str, field: &'static str, len: usize) -> Result<(), ProfileError> {
    if value.len() == len && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ProfileError::BadFormat { field, len })
    }
}

macro_rules! digit_field {
    ($name:ident, $field:literal, $len:literal) => {
        /// Fixed-length numeric-string document field. Wraps [`Masked`] so
        /// the value never appears in `Debug` output or logs.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(Masked<String>);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ProfileError> {
                let value = value.into();
                validate_digits(&value, $field, $len)?;
                Ok(Self(Masked(value)))
            }

            pub fn as_str(&self) -> &str {
                self.0.inner()
            }
        }

        impl TryFrom<String> for $name {
            type Error = ProfileError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

digit_field!(NationalId, "national_id", 13);
digit_field!(LicenceNumber, "licence_number", 15);
digit_field!(PhoneNumber, "phone_number", 11);

/// Customer-supplied identity details attached to every booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenterProfile {
    pub customer_name: String,
    pub father_name: String,
    pub address: String,
    pub national_id: NationalId,
    pub licence_number: LicenceNumber,
    pub phone_number: PhoneNumber,
}

impl RenterProfile {
    /// Validate raw request strings into a profile.
    pub fn parse(
        customer_name: &str,
        father_name: &str,
        address: &str,
        national_id: &str,
        licence_number: &str,
        phone_number: &str,
    ) -> Result<Self, ProfileError> {
        fn required(value: &str, field: &'static str) -> Result<String, ProfileError> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ProfileError::Missing { field })
            } else {
                Ok(trimmed.to_string())
            }
        }

        Ok(Self {
            customer_name: required(customer_name, "customer_name")?,
            father_name: required(father_name, "father_name")?,
            address: required(address, "address")?,
            national_id: NationalId::new(national_id)?,
            licence_number: LicenceNumber::new(licence_number)?,
            phone_number: PhoneNumber::new(phone_number)?,
        })
    }
}
