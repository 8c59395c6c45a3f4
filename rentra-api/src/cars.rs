use axum::{extract::State, http::StatusCode, Json};
use rentra_fleet::{Car, NewCar};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/cars
/// Public catalog listing for the browse flow.
pub async fn list_cars(State(state): State<AppState>) -> Result<Json<Vec<Car>>, AppError> {
    Ok(Json(state.fleet.list_cars().await?))
}

/// POST /api/admin/cars
pub async fn add_car(
    State(state): State<AppState>,
    Json(payload): Json<NewCar>,
) -> Result<(StatusCode, Json<Car>), AppError> {
    let car = payload.into_car()?;
    state.fleet.insert_car(&car).await?;
    info!(car_id = %car.id, name = %car.name, "car added to fleet");
    Ok((StatusCode::CREATED, Json(car)))
}
