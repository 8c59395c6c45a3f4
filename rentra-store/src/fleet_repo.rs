use async_trait::async_trait;
use rentra_core::{StoreError, StoreResult};
use rentra_fleet::{Car, FleetRepository};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgFleetStore {
    pool: PgPool,
}

impl PgFleetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CarRow {
    id: Uuid,
    name: String,
    image: String,
    brand: String,
    daily_rate_minor: i64,
    capacity: i32,
    available: bool,
}

impl From<CarRow> for Car {
    fn from(row: CarRow) -> Self {
        Car {
            id: row.id,
            name: row.name,
            image: row.image,
            brand: row.brand,
            daily_rate_minor: row.daily_rate_minor,
            capacity: row.capacity,
            available: row.available,
        }
    }
}

pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(err.to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

const CAR_COLUMNS: &str = "id, name, image, brand, daily_rate_minor, capacity, available";

#[async_trait]
impl FleetRepository for PgFleetStore {
    async fn insert_car(&self, car: &Car) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO cars (id, name, image, brand, daily_rate_minor, capacity, available) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(car.id)
        .bind(&car.name)
        .bind(&car.image)
        .bind(&car.brand)
        .bind(car.daily_rate_minor)
        .bind(car.capacity)
        .bind(car.available)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_car(&self, id: Uuid) -> StoreResult<Option<Car>> {
        let row = sqlx::query_as::<_, CarRow>(&format!(
            "SELECT {CAR_COLUMNS} FROM cars WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Car::from))
    }

    async fn list_cars(&self) -> StoreResult<Vec<Car>> {
        let rows = sqlx::query_as::<_, CarRow>(&format!(
            "SELECT {CAR_COLUMNS} FROM cars ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Car::from).collect())
    }
}
