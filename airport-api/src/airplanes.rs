use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use airport_catalog::{validate_airplane, validate_airplane_type, NameQuery};
use airport_shared::{
    Airplane, AirplaneOverview, AirplaneType, AirplaneTypeOverview, NewAirplane, NewAirplaneType,
};
use serde::Serialize;

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AirplaneSummary {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

impl From<Airplane> for AirplaneSummary {
    fn from(airplane: Airplane) -> Self {
        Self {
            capacity: airplane.capacity(),
            id: airplane.id,
            name: airplane.name,
            rows: airplane.rows,
            seats_in_row: airplane.seats_in_row,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AirplaneTypeDetail {
    pub id: i64,
    pub name: String,
    pub airplanes: Vec<AirplaneSummary>,
}

/// Airplane as written: type by id
#[derive(Debug, Serialize)]
pub struct AirplaneResponse {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
    pub airplane_type: i64,
}

impl From<Airplane> for AirplaneResponse {
    fn from(airplane: Airplane) -> Self {
        Self {
            capacity: airplane.capacity(),
            id: airplane.id,
            name: airplane.name,
            rows: airplane.rows,
            seats_in_row: airplane.seats_in_row,
            airplane_type: airplane.airplane_type_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AirplaneDetail {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
    pub airplane_type: AirplaneType,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/airplane_types", get(list_airplane_types).post(create_airplane_type))
        .route(
            "/airplane_types/{id}",
            get(get_airplane_type)
                .put(update_airplane_type)
                .delete(delete_airplane_type),
        )
        .route("/airplanes", get(list_airplanes).post(create_airplane))
        .route(
            "/airplanes/{id}",
            get(get_airplane).put(update_airplane).delete(delete_airplane),
        )
}

// ============================================================================
// Airplane Types
// ============================================================================

async fn list_airplane_types(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<AirplaneTypeOverview>>, AppError> {
    let types = state.store.list_airplane_types(&query.filter()).await?;
    Ok(Json(page.paginate(types, state.pagination.page_size)?))
}

async fn get_airplane_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AirplaneTypeDetail>, AppError> {
    let airplane_type = state
        .store
        .get_airplane_type(id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let airplanes = state.store.airplanes_of_type(id).await?;

    Ok(Json(AirplaneTypeDetail {
        id: airplane_type.id,
        name: airplane_type.name,
        airplanes: airplanes.into_iter().map(AirplaneSummary::from).collect(),
    }))
}

async fn create_airplane_type(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewAirplaneType>,
) -> Result<(StatusCode, Json<AirplaneType>), AppError> {
    validate_airplane_type(&req)?;
    let airplane_type = state.store.create_airplane_type(&req).await?;
    tracing::info!(airplane_type_id = airplane_type.id, "Airplane type created");
    Ok((StatusCode::CREATED, Json(airplane_type)))
}

async fn update_airplane_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NewAirplaneType>,
) -> Result<Json<AirplaneType>, AppError> {
    validate_airplane_type(&req)?;
    let airplane_type = state
        .store
        .update_airplane_type(id, &req)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(airplane_type))
}

async fn delete_airplane_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_airplane_type(id).await? {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Airplanes
// ============================================================================

async fn list_airplanes(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<AirplaneOverview>>, AppError> {
    let airplanes = state.store.list_airplanes(&query.filter()).await?;
    Ok(Json(page.paginate(airplanes, state.pagination.page_size)?))
}

async fn get_airplane(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AirplaneDetail>, AppError> {
    let airplane = state.store.get_airplane(id).await?.ok_or_else(AppError::not_found)?;
    let airplane_type = state
        .store
        .get_airplane_type(airplane.airplane_type_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(AirplaneDetail {
        capacity: airplane.capacity(),
        id: airplane.id,
        name: airplane.name,
        rows: airplane.rows,
        seats_in_row: airplane.seats_in_row,
        airplane_type,
    }))
}

async fn create_airplane(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewAirplane>,
) -> Result<(StatusCode, Json<AirplaneResponse>), AppError> {
    validate_airplane(&req)?;
    let airplane = state.store.create_airplane(&req).await?;
    tracing::info!(airplane_id = airplane.id, capacity = airplane.capacity(), "Airplane created");
    Ok((StatusCode::CREATED, Json(airplane.into())))
}

async fn update_airplane(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NewAirplane>,
) -> Result<Json<AirplaneResponse>, AppError> {
    validate_airplane(&req)?;
    let airplane = state
        .store
        .update_airplane(id, &req)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(airplane.into()))
}

/// Flights flown by the airplane, and their tickets, are removed with it
async fn delete_airplane(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_airplane(id).await? {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
