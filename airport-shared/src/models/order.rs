use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::SeatGrid;

/// One requested seat as submitted by a client
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TicketRequest {
    pub row: i32,
    pub seat: i32,
    pub flight: i64,
}

/// A sold seat on a flight, owned by exactly one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub flight_id: i64,
    pub order_id: i64,
}

/// A user's purchase. Tickets are kept ordered by `(row, seat)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<Ticket>,
}

/// Order payload handed to the store once every ticket has been validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketRequest>,
}

/// What the order path needs to know about a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightSeating {
    pub flight_id: i64,
    pub grid: SeatGrid,
}
