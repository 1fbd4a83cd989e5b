use async_trait::async_trait;
use airport_core::{OrderRepository, OrderStore, StoreError, StoreResult, TicketLedger};
use airport_shared::{FlightSeating, NewOrder, Order, SeatGrid, Ticket};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::database::{db_error, PgStore};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    row: i32,
    seat: i32,
    flight_id: i64,
    order_id: i64,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            row: row.row,
            seat: row.seat,
            flight_id: row.flight_id,
            order_id: row.order_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatingRow {
    id: i64,
    rows: i32,
    seats_in_row: i32,
}

impl PgStore {
    async fn attach_tickets(&self, orders: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let rows: Vec<TicketRow> = sqlx::query_as(
            r#"
            SELECT id, "row", seat, flight_id, order_id FROM tickets
            WHERE order_id = ANY($1)
            ORDER BY "row", seat, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut by_order: HashMap<i64, Vec<Ticket>> = HashMap::new();
        for row in rows {
            by_order.entry(row.order_id).or_default().push(row.into());
        }

        Ok(orders
            .into_iter()
            .map(|o| Order {
                id: o.id,
                user_id: o.user_id,
                created_at: o.created_at,
                tickets: by_order.remove(&o.id).unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn list_orders(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, created_at FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.attach_tickets(rows).await
    }

    async fn get_order(&self, user_id: Uuid, id: i64) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, created_at FROM orders WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => Ok(self.attach_tickets(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_order(&self, user_id: Uuid, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Order transaction over a pooled Postgres connection. Dropping it without
/// commit rolls back.
pub struct PgTicketLedger {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn TicketLedger>> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgTicketLedger { tx }))
    }
}

#[async_trait]
impl TicketLedger for PgTicketLedger {
    async fn find_flight(&mut self, flight_id: i64) -> StoreResult<Option<FlightSeating>> {
        let row: Option<SeatingRow> = sqlx::query_as(
            r#"
            SELECT f.id, a."rows", a.seats_in_row
            FROM flights f
            JOIN airplanes a ON a.id = f.airplane_id
            WHERE f.id = $1
            FOR SHARE
            "#,
        )
        .bind(flight_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.map(|r| FlightSeating {
            flight_id: r.id,
            grid: SeatGrid { rows: r.rows, seats_in_row: r.seats_in_row },
        }))
    }

    async fn count_tickets_for(&mut self, flight_id: i64, row: i32, seat: i32) -> StoreResult<i64> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM tickets WHERE flight_id = $1 AND "row" = $2 AND seat = $3"#,
        )
        .bind(flight_id)
        .bind(row)
        .bind(seat)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn insert_order_with_tickets(&mut self, order: &NewOrder) -> StoreResult<Order> {
        let row: OrderRow = sqlx::query_as(
            "INSERT INTO orders (user_id, created_at) VALUES ($1, $2) RETURNING id, user_id, created_at",
        )
        .bind(order.user_id)
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        let mut tickets = Vec::with_capacity(order.tickets.len());
        for (index, request) in order.tickets.iter().enumerate() {
            let ticket: TicketRow = sqlx::query_as(
                r#"
                INSERT INTO tickets ("row", seat, flight_id, order_id) VALUES ($1, $2, $3, $4)
                RETURNING id, "row", seat, flight_id, order_id
                "#,
            )
            .bind(request.row)
            .bind(request.seat)
            .bind(request.flight)
            .bind(row.id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| match db_error(e) {
                StoreError::UniqueViolation { .. } => {
                    debug!(index, "Ticket insert hit the seat uniqueness constraint");
                    StoreError::UniqueViolation { index: Some(index) }
                }
                StoreError::MissingReference(_) => StoreError::UnknownFlight {
                    index,
                    flight_id: request.flight,
                },
                other => other,
            })?;
            tickets.push(Ticket::from(ticket));
        }
        tickets.sort_by_key(|t| (t.row, t.seat, t.id));

        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            tickets,
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(db_error)
    }
}
