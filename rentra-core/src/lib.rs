pub mod identity;
pub mod payment;
pub mod repository;
pub mod webhook;

pub use identity::{Requester, Role};
pub use repository::{StoreError, StoreResult};
