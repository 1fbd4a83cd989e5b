use std::collections::HashMap;
use std::sync::Arc;

use airport_core::{validate_seat, OrderStore, TicketLedger};
use airport_shared::{NewOrder, Order, SeatGrid, TicketRequest};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batch::find_duplicate;
use crate::error::OrderError;

/// Creates orders together with their tickets as one all-or-nothing unit.
///
/// Steps, all inside a single store transaction:
/// 1. resolve every flight and check the seat against its airplane grid
/// 2. reject repeated `(row, seat, flight)` triples within the batch
/// 3. reject seats that already have a persisted ticket
/// 4. insert the order and its tickets, then commit
///
/// Any failure rolls the transaction back. A uniqueness violation raised by
/// the store while inserting is reported exactly like a pre-check hit.
pub struct OrderBuilder {
    store: Arc<dyn OrderStore>,
}

impl OrderBuilder {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn create_order(
        &self,
        user_id: Uuid,
        requests: &[TicketRequest],
    ) -> Result<Order, OrderError> {
        if requests.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut ledger = self.store.begin().await?;

        match Self::fill(&mut ledger, user_id, requests).await {
            Ok(order) => {
                ledger
                    .commit()
                    .await
                    .map_err(|e| OrderError::from_insert(e, requests))?;
                info!(
                    order_id = order.id,
                    user_id = %user_id,
                    tickets = order.tickets.len(),
                    "Order created"
                );
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = ledger.rollback().await {
                    warn!("Rollback after rejected order failed: {}", rollback_err);
                }
                debug!(user_id = %user_id, "Order rejected: {}", err);
                Err(err)
            }
        }
    }

    async fn fill(
        ledger: &mut Box<dyn TicketLedger>,
        user_id: Uuid,
        requests: &[TicketRequest],
    ) -> Result<Order, OrderError> {
        // 1. Range check against each flight's airplane
        let mut grids: HashMap<i64, SeatGrid> = HashMap::new();
        for (index, request) in requests.iter().enumerate() {
            let grid = match grids.get(&request.flight) {
                Some(grid) => *grid,
                None => {
                    let seating = ledger.find_flight(request.flight).await?.ok_or(
                        OrderError::FlightNotFound {
                            index,
                            flight_id: request.flight,
                        },
                    )?;
                    grids.insert(request.flight, seating.grid);
                    seating.grid
                }
            };

            validate_seat(request.row, request.seat, &grid)
                .map_err(|source| OrderError::OutOfRange { index, source })?;
        }

        // 2. Within-batch uniqueness
        if let Some((index, first_index)) = find_duplicate(requests) {
            return Err(OrderError::DuplicateInBatch {
                index,
                first_index,
                ticket: requests[index],
            });
        }

        // 3. Already sold seats
        for (index, request) in requests.iter().enumerate() {
            let sold = ledger
                .count_tickets_for(request.flight, request.row, request.seat)
                .await?;
            if sold > 0 {
                return Err(OrderError::SeatTaken {
                    index: Some(index),
                    ticket: Some(*request),
                });
            }
        }

        // 4. Persist
        let new_order = NewOrder {
            user_id,
            created_at: Utc::now(),
            tickets: requests.to_vec(),
        };
        ledger
            .insert_order_with_tickets(&new_order)
            .await
            .map_err(|e| OrderError::from_insert(e, requests))
    }
}
