use airport_catalog::{CatalogError, NON_FIELD_ERRORS};
use airport_core::StoreError;
use airport_order::OrderError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    /// `details` maps field names to their messages
    #[error("{message}")]
    ValidationError { message: String, details: Value },
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    InternalServerError(String),
    #[error(transparent)]
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn not_found() -> Self {
        AppError::NotFoundError("Not found.".to_string())
    }

    pub fn validation(details: Value) -> Self {
        AppError::ValidationError {
            message: "Invalid input.".to_string(),
            details,
        }
    }

    fn field_error(field: &str, message: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert(field.to_string(), json!([message.into()]));
        Self::validation(Value::Object(details))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::ValidationError { message, details } => {
                (StatusCode::BAD_REQUEST, message, Some(details))
            }
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
        };

        let body = match details {
            Some(details) => Json(json!({ "error": error_message, "details": details })),
            None => Json(json!({ "error": error_message })),
        };

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field_error(NON_FIELD_ERRORS, rejection.body_text())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingReference(msg) => AppError::field_error(NON_FIELD_ERRORS, msg),
            StoreError::UniqueViolation { .. } => AppError::field_error(
                NON_FIELD_ERRORS,
                "The fields must make a unique set.",
            ),
            StoreError::UnknownFlight { .. } => AppError::field_error("flight", err.to_string()),
            StoreError::TicketsOutsideGrid { .. } => {
                AppError::field_error(NON_FIELD_ERRORS, err.to_string())
            }
            StoreError::Database(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid { field, message } => AppError::field_error(field, message),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        if let OrderError::Store(store_err) = err {
            return AppError::InternalServerError(store_err.to_string());
        }

        let message = err.to_string();
        let details = match (err.ticket_index(), err.field()) {
            (Some(index), field) => json!({
                "tickets": { index.to_string(): { field.unwrap_or(NON_FIELD_ERRORS): [message] } }
            }),
            (None, _) if matches!(err, OrderError::EmptyOrder) => json!({ "tickets": [message] }),
            (None, _) => json!({ NON_FIELD_ERRORS: [message] }),
        };
        AppError::validation(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airport_core::{SeatField, SeatRangeError};
    use airport_shared::TicketRequest;

    #[test]
    fn test_out_of_range_details_keyed_by_index_and_field() {
        let err = AppError::from(OrderError::OutOfRange {
            index: 0,
            source: SeatRangeError { field: SeatField::Row, value: 100, max: 25 },
        });
        let AppError::ValidationError { details, .. } = err else {
            panic!("expected a validation error");
        };
        let messages = details["tickets"]["0"]["row"].as_array().unwrap();
        assert!(messages[0].as_str().unwrap().contains("(1, 25)"));
    }

    #[test]
    fn test_seat_taken_is_a_non_field_error_of_the_ticket() {
        let err = AppError::from(OrderError::SeatTaken {
            index: Some(1),
            ticket: Some(TicketRequest { row: 2, seat: 3, flight: 1 }),
        });
        let AppError::ValidationError { details, .. } = err else {
            panic!("expected a validation error");
        };
        assert!(details["tickets"]["1"][NON_FIELD_ERRORS].is_array());
    }

    #[test]
    fn test_store_failures_are_internal() {
        let err = AppError::from(OrderError::Store(StoreError::Database("boom".into())));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::from(StoreError::MissingReference("route 9".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stranded_tickets_are_a_validation_error() {
        let err = AppError::from(StoreError::TicketsOutsideGrid { count: 2 });
        let AppError::ValidationError { details, .. } = err else {
            panic!("expected a validation error");
        };
        let message = details[NON_FIELD_ERRORS][0].as_str().unwrap();
        assert!(message.contains("outside the new seat grid"));
    }
}
