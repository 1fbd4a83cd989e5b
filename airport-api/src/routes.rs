use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use airport_catalog::{validate_route, RouteQuery};
use airport_shared::{Airport, NewRoute, Route, RouteOverview};
use serde::Serialize;

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

/// Route as written: airports by id
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub id: i64,
    pub source: i64,
    pub destination: i64,
    pub distance: i32,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        Self {
            id: route.id,
            source: route.source_id,
            destination: route.destination_id,
            distance: route.distance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RouteDetail {
    pub id: i64,
    pub source: Airport,
    pub destination: Airport,
    pub distance: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/{id}", get(get_route).put(update_route).delete(delete_route))
}

async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<RouteOverview>>, AppError> {
    let routes = state.store.list_routes(&query.filter()).await?;
    Ok(Json(page.paginate(routes, state.pagination.page_size)?))
}

async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RouteDetail>, AppError> {
    let route = state.store.get_route(id).await?.ok_or_else(AppError::not_found)?;
    let source = state.store.get_airport(route.source_id).await?;
    let destination = state.store.get_airport(route.destination_id).await?;

    match (source, destination) {
        (Some(source), Some(destination)) => Ok(Json(RouteDetail {
            id: route.id,
            source,
            destination,
            distance: route.distance,
        })),
        // Airport removed between the two reads; the route went with it
        _ => Err(AppError::not_found()),
    }
}

async fn create_route(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewRoute>,
) -> Result<(StatusCode, Json<RouteResponse>), AppError> {
    validate_route(&req)?;
    let route = state.store.create_route(&req).await?;
    tracing::info!(route_id = route.id, "Route created");
    Ok((StatusCode::CREATED, Json(route.into())))
}

async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NewRoute>,
) -> Result<Json<RouteResponse>, AppError> {
    validate_route(&req)?;
    let route = state
        .store
        .update_route(id, &req)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(route.into()))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_route(id).await? {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
