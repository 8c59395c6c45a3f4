pub mod car;
pub mod repository;

pub use car::{Car, FleetError, NewCar};
pub use repository::FleetRepository;
