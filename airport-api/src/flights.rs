use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use airport_catalog::FlightQuery;
use airport_shared::{Flight, FlightOverview, NewFlight, RouteOverview};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::airplanes::AirplaneResponse;
use crate::crew::CrewResponse;
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

/// Flight as written: route, airplane and crew by id
#[derive(Debug, Serialize)]
pub struct FlightResponse {
    pub id: i64,
    pub route: i64,
    pub airplane: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub crew: Vec<i64>,
}

impl From<Flight> for FlightResponse {
    fn from(flight: Flight) -> Self {
        Self {
            id: flight.id,
            route: flight.route_id,
            airplane: flight.airplane_id,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            crew: flight.crew_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlightDetail {
    pub id: i64,
    pub route: RouteOverview,
    pub airplane: AirplaneResponse,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub crew: Vec<CrewResponse>,
    pub tickets_available: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/flights", get(list_flights).post(create_flight))
        .route(
            "/flights/{id}",
            get(get_flight).put(update_flight).delete(delete_flight),
        )
}

/// GET /api/airport/flights?departure_time=YYYY-MM-DD&arrival_time=YYYY-MM-DD
async fn list_flights(
    State(state): State<AppState>,
    Query(query): Query<FlightQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<FlightOverview>>, AppError> {
    let filter = query.filter()?;
    let flights = state.store.list_flights(&filter).await?;
    Ok(Json(page.paginate(flights, state.pagination.page_size)?))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FlightDetail>, AppError> {
    let store = &state.store;
    let flight = store.get_flight(id).await?.ok_or_else(AppError::not_found)?;

    let route = store.get_route(flight.route_id).await?.ok_or_else(AppError::not_found)?;
    let source = store.get_airport(route.source_id).await?.ok_or_else(AppError::not_found)?;
    let destination = store
        .get_airport(route.destination_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let airplane = store
        .get_airplane(flight.airplane_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let crew = store.crew_of_flight(flight.id).await?;
    let tickets_available = store
        .flight_overviews(&[flight.id])
        .await?
        .first()
        .map_or(airplane.capacity(), |overview| overview.tickets_available);

    Ok(Json(FlightDetail {
        id: flight.id,
        route: RouteOverview {
            id: route.id,
            source: source.name,
            destination: destination.name,
            distance: route.distance,
        },
        airplane: airplane.into(),
        departure_time: flight.departure_time,
        arrival_time: flight.arrival_time,
        crew: crew.into_iter().map(CrewResponse::from).collect(),
        tickets_available,
    }))
}

async fn create_flight(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewFlight>,
) -> Result<(StatusCode, Json<FlightResponse>), AppError> {
    let flight = state.store.create_flight(&req).await?;
    tracing::info!(flight_id = flight.id, route_id = flight.route_id, "Flight created");
    Ok((StatusCode::CREATED, Json(flight.into())))
}

async fn update_flight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NewFlight>,
) -> Result<Json<FlightResponse>, AppError> {
    let flight = state
        .store
        .update_flight(id, &req)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(flight.into()))
}

/// Tickets sold on the flight are removed with it, and so are orders left
/// without tickets
async fn delete_flight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_flight(id).await? {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
