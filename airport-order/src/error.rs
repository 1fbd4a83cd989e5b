use airport_core::{SeatRangeError, StoreError};
use airport_shared::TicketRequest;

/// Why an order was rejected. Every variant except `Store` is a client-side
/// validation failure; in all cases nothing was persisted.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("an order must contain at least one ticket")]
    EmptyOrder,

    #[error("ticket {index}: flight {flight_id} does not exist")]
    FlightNotFound { index: usize, flight_id: i64 },

    #[error("ticket {index}: {source}")]
    OutOfRange {
        index: usize,
        #[source]
        source: SeatRangeError,
    },

    #[error("ticket {index}: duplicates ticket {first_index} in the same order")]
    DuplicateInBatch {
        index: usize,
        first_index: usize,
        ticket: TicketRequest,
    },

    /// The seat is sold. `index` and `ticket` are unset when a concurrent
    /// order won the seat at commit and the store could not say which ticket
    /// lost.
    #[error("{}", seat_taken_message(.index, .ticket))]
    SeatTaken {
        index: Option<usize>,
        ticket: Option<TicketRequest>,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl OrderError {
    /// Index of the offending ticket, when the failure is tied to one
    pub fn ticket_index(&self) -> Option<usize> {
        match self {
            OrderError::FlightNotFound { index, .. }
            | OrderError::OutOfRange { index, .. }
            | OrderError::DuplicateInBatch { index, .. }
            | OrderError::SeatTaken { index: Some(index), .. } => Some(*index),
            _ => None,
        }
    }

    /// Ticket field the failure is attributed to
    pub fn field(&self) -> Option<&'static str> {
        match self {
            OrderError::FlightNotFound { .. } => Some("flight"),
            OrderError::OutOfRange { source, .. } => Some(source.field.as_str()),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        !matches!(self, OrderError::Store(_))
    }

    pub(crate) fn from_insert(err: StoreError, requests: &[TicketRequest]) -> Self {
        match err {
            StoreError::UniqueViolation { index: Some(index) } if index < requests.len() => {
                OrderError::SeatTaken {
                    index: Some(index),
                    ticket: Some(requests[index]),
                }
            }
            StoreError::UniqueViolation { .. } => OrderError::SeatTaken {
                index: None,
                ticket: None,
            },
            StoreError::UnknownFlight { index, flight_id } => {
                OrderError::FlightNotFound { index, flight_id }
            }
            other => OrderError::Store(other),
        }
    }
}

fn seat_taken_message(index: &Option<usize>, ticket: &Option<TicketRequest>) -> String {
    match (index, ticket) {
        (Some(index), Some(t)) => format!(
            "ticket {index}: seat (row {}, seat {}) on flight {} is already taken",
            t.row, t.seat, t.flight
        ),
        _ => "one of the requested seats is already taken".to_string(),
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        OrderError::Store(err)
    }
}
