use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use airport_catalog::NON_FIELD_ERRORS;
use airport_shared::{FlightOverview, Order, TicketRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::metrics::OrderOutcome;
use crate::middleware::CurrentUser;
use crate::pagination::{Page, PageQuery};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub flight: FlightOverview,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketResponse>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order).delete(delete_order))
}

const REQUIRED: &str = "This field is required.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";

/// Reads one integer field of a ticket object, recording a message under
/// `field` when it is missing or does not fit `T`.
fn ticket_field<T: TryFrom<i64>>(
    ticket: &Map<String, Value>,
    field: &str,
    errors: &mut Map<String, Value>,
) -> Option<T> {
    let message = match ticket.get(field) {
        None | Some(Value::Null) => REQUIRED,
        Some(value) => match value.as_i64().and_then(|n| T::try_from(n).ok()) {
            Some(n) => return Some(n),
            None => NOT_AN_INTEGER,
        },
    };
    errors.insert(field.to_string(), json!([message]));
    None
}

/// Turns a create-order body into ticket requests. Shape errors are keyed by
/// ticket index and field, like the errors of the order itself.
fn parse_tickets(body: &Value) -> Result<Vec<TicketRequest>, AppError> {
    let Some(body) = body.as_object() else {
        return Err(AppError::validation(json!({
            NON_FIELD_ERRORS: ["Invalid data. Expected a dictionary."]
        })));
    };
    let items = match body.get("tickets") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AppError::validation(json!({
                "tickets": ["Expected a list of items."]
            })))
        }
    };

    let mut tickets = Vec::with_capacity(items.len());
    let mut invalid = Map::new();
    for (index, item) in items.iter().enumerate() {
        let mut errors = Map::new();
        let Some(ticket) = item.as_object() else {
            errors.insert(
                NON_FIELD_ERRORS.to_string(),
                json!(["Invalid data. Expected a dictionary."]),
            );
            invalid.insert(index.to_string(), Value::Object(errors));
            continue;
        };

        let row = ticket_field::<i32>(ticket, "row", &mut errors);
        let seat = ticket_field::<i32>(ticket, "seat", &mut errors);
        let flight = ticket_field::<i64>(ticket, "flight", &mut errors);
        match (row, seat, flight) {
            (Some(row), Some(seat), Some(flight)) => {
                tickets.push(TicketRequest { row, seat, flight })
            }
            _ => {
                invalid.insert(index.to_string(), Value::Object(errors));
            }
        }
    }

    if invalid.is_empty() {
        Ok(tickets)
    } else {
        Err(AppError::validation(json!({ "tickets": invalid })))
    }
}

/// Attaches a flight summary to every ticket of `orders`
async fn render_orders(state: &AppState, orders: Vec<Order>) -> Result<Vec<OrderResponse>, AppError> {
    let mut flight_ids: Vec<i64> = orders
        .iter()
        .flat_map(|o| o.tickets.iter().map(|t| t.flight_id))
        .collect();
    flight_ids.sort_unstable();
    flight_ids.dedup();

    let flights: HashMap<i64, FlightOverview> = state
        .store
        .flight_overviews(&flight_ids)
        .await?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();

    orders
        .into_iter()
        .map(|order| {
            let tickets = order
                .tickets
                .into_iter()
                .map(|ticket| {
                    let flight = flights.get(&ticket.flight_id).cloned().ok_or_else(|| {
                        AppError::InternalServerError(format!(
                            "flight {} of ticket {} has no overview",
                            ticket.flight_id, ticket.id
                        ))
                    })?;
                    Ok(TicketResponse {
                        id: ticket.id,
                        row: ticket.row,
                        seat: ticket.seat,
                        flight,
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()?;
            Ok(OrderResponse {
                id: order.id,
                created_at: order.created_at,
                tickets,
            })
        })
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/airport/orders
async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<OrderResponse>>, AppError> {
    let orders = state.store.list_orders(user.id).await?;
    let page = page.paginate(orders, state.pagination.page_size)?;
    let results = render_orders(&state, page.results).await?;

    Ok(Json(Page {
        count: page.count,
        page: page.page,
        page_size: page.page_size,
        results,
    }))
}

/// POST /api/airport/orders
async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<Value>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let tickets = parse_tickets(&body).inspect_err(|_| {
        state.metrics.record_order(OrderOutcome::Rejected);
        tracing::warn!(user_id = %user.id, "Order rejected: malformed tickets");
    })?;

    match state.orders.create_order(user.id, &tickets).await {
        Ok(order) => {
            state.metrics.record_order(OrderOutcome::Created);
            let mut rendered = render_orders(&state, vec![order]).await?;
            let order = rendered
                .pop()
                .ok_or_else(|| AppError::InternalServerError("created order vanished".to_string()))?;
            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(err) if err.is_validation() => {
            state.metrics.record_order(OrderOutcome::Rejected);
            tracing::warn!(user_id = %user.id, "Order rejected: {}", err);
            Err(err.into())
        }
        Err(err) => {
            state.metrics.record_order(OrderOutcome::Failed);
            Err(err.into())
        }
    }
}

async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .store
        .get_order(user.id, id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let mut rendered = render_orders(&state, vec![order]).await?;
    rendered.pop().map(Json).ok_or_else(AppError::not_found)
}

/// Tickets of the order are released with it
async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_order(user.id, id).await? {
        return Err(AppError::not_found());
    }
    tracing::info!(order_id = id, user_id = %user.id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(err: AppError) -> Value {
        match err {
            AppError::ValidationError { details, .. } => details,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_well_formed_tickets() {
        let tickets = parse_tickets(&json!({
            "tickets": [{"row": 2, "seat": 3, "flight": 1}, {"row": 2, "seat": 4, "flight": 1}]
        }))
        .unwrap();
        assert_eq!(tickets, vec![
            TicketRequest { row: 2, seat: 3, flight: 1 },
            TicketRequest { row: 2, seat: 4, flight: 1 },
        ]);
    }

    #[test]
    fn test_missing_tickets_is_an_empty_order() {
        assert!(parse_tickets(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_field_errors_keyed_by_ticket_index() {
        let err = parse_tickets(&json!({
            "tickets": [
                {"row": 1, "seat": 1, "flight": 1},
                {"row": 2, "seat": 3},
                {"row": "two", "seat": 3, "flight": 1},
                {"row": 3000000000i64, "seat": 1.5, "flight": 1}
            ]
        }))
        .unwrap_err();
        let details = details(err);

        assert!(details["tickets"].get("0").is_none());
        assert_eq!(details["tickets"]["1"]["flight"][0], REQUIRED);
        assert_eq!(details["tickets"]["2"]["row"][0], NOT_AN_INTEGER);
        assert_eq!(details["tickets"]["3"]["row"][0], NOT_AN_INTEGER);
        assert_eq!(details["tickets"]["3"]["seat"][0], NOT_AN_INTEGER);
    }

    #[test]
    fn test_non_object_ticket_and_non_list_tickets() {
        let not_an_object = details(parse_tickets(&json!({"tickets": [7]})).unwrap_err());
        assert!(not_an_object["tickets"]["0"][NON_FIELD_ERRORS].is_array());

        let not_a_list = details(parse_tickets(&json!({"tickets": "2,3"})).unwrap_err());
        assert_eq!(not_a_list["tickets"][0], "Expected a list of items.");
    }
}
