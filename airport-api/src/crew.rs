use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use airport_catalog::{validate_crew, CrewQuery};
use airport_shared::{Crew, NewCrew};
use serde::Serialize;

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CrewResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<Crew> for CrewResponse {
    fn from(crew: Crew) -> Self {
        Self {
            full_name: crew.full_name(),
            id: crew.id,
            first_name: crew.first_name,
            last_name: crew.last_name,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/crew", get(list_crew).post(create_crew))
        .route("/crew/{id}", get(get_crew).put(update_crew).delete(delete_crew))
}

/// GET /api/airport/crew
async fn list_crew(
    State(state): State<AppState>,
    Query(query): Query<CrewQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<CrewResponse>>, AppError> {
    let crew = state.store.list_crew(&query.filter()).await?;
    let items = crew.into_iter().map(CrewResponse::from).collect();
    Ok(Json(page.paginate(items, state.pagination.page_size)?))
}

async fn get_crew(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CrewResponse>, AppError> {
    let crew = state.store.get_crew(id).await?.ok_or_else(AppError::not_found)?;
    Ok(Json(crew.into()))
}

async fn create_crew(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewCrew>,
) -> Result<(StatusCode, Json<CrewResponse>), AppError> {
    validate_crew(&req)?;
    let crew = state.store.create_crew(&req).await?;
    tracing::info!(crew_id = crew.id, "Crew member created");
    Ok((StatusCode::CREATED, Json(crew.into())))
}

async fn update_crew(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NewCrew>,
) -> Result<Json<CrewResponse>, AppError> {
    validate_crew(&req)?;
    let crew = state
        .store
        .update_crew(id, &req)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(crew.into()))
}

async fn delete_crew(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_crew(id).await? {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
