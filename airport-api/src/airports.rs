use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use airport_catalog::{validate_airport, NameQuery};
use airport_shared::{Airport, NewAirport};

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/airports", get(list_airports).post(create_airport))
        .route(
            "/airports/{id}",
            get(get_airport).put(update_airport).delete(delete_airport),
        )
}

async fn list_airports(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Airport>>, AppError> {
    let airports = state.store.list_airports(&query.filter()).await?;
    Ok(Json(page.paginate(airports, state.pagination.page_size)?))
}

async fn get_airport(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Airport>, AppError> {
    let airport = state.store.get_airport(id).await?.ok_or_else(AppError::not_found)?;
    Ok(Json(airport))
}

async fn create_airport(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewAirport>,
) -> Result<(StatusCode, Json<Airport>), AppError> {
    validate_airport(&req)?;
    let airport = state.store.create_airport(&req).await?;
    tracing::info!(airport_id = airport.id, "Airport created");
    Ok((StatusCode::CREATED, Json(airport)))
}

async fn update_airport(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NewAirport>,
) -> Result<Json<Airport>, AppError> {
    validate_airport(&req)?;
    let airport = state
        .store
        .update_airport(id, &req)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(airport))
}

/// Routes from or to the airport are removed with it
async fn delete_airport(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_airport(id).await? {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
