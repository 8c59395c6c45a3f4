pub mod engine;
pub mod models;
pub mod overlap;
pub mod profile;
pub mod reconcile;
pub mod repository;

pub use engine::{BookingEngine, BookingError, Confirmation, StatusChange};
pub use models::{AvailabilityAction, Booking, BookingRequest, BookingStatus};
pub use overlap::DateRange;
pub use profile::RenterProfile;
pub use reconcile::{PaymentReconciler, ReconcileError, WebhookOutcome};
pub use repository::BookingRepository;
