use async_trait::async_trait;
use rentra_core::StoreResult;
use uuid::Uuid;

use crate::car::Car;

/// Repository trait for fleet catalog access.
///
/// There is deliberately no standalone availability setter: the flag is a
/// derivative of the booking set and is only written inside booking
/// transactions.
#[async_trait]
pub trait FleetRepository: Send + Sync {
    async fn insert_car(&self, car: &Car) -> StoreResult<()>;

    async fn get_car(&self, id: Uuid) -> StoreResult<Option<Car>>;

    async fn list_cars(&self) -> StoreResult<Vec<Car>>;
}
