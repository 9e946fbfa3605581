//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, NoteLineViolations};
use orders::OrderError;
use projections::ProjectionError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Order(err) => order_status(err),
            ApiError::Projection(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The batched commit violations carried by this error, if any.
    fn violations(&self) -> Option<&NoteLineViolations> {
        match self {
            ApiError::Domain(DomainError::InvalidNoteLines(violations))
            | ApiError::Order(OrderError::Domain(DomainError::InvalidNoteLines(violations))) => {
                Some(violations)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let mut body = serde_json::json!({ "error": message });
        if let Some(violations) = self.violations() {
            body["violations"] = serde_json::json!(violations);
        }
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::MissingIsbn | DomainError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        DomainError::NoteNotFound(_) | DomainError::WarehouseNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidNoteLines(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn order_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::MissingCustomerDisplayId
        | OrderError::NoBooksProvided
        | OrderError::MissingIsbn
        | OrderError::NoOrderLines
        | OrderError::InvalidQuantity { .. }
        | OrderError::MissingSupplierName(_)
        | OrderError::SupplierMismatch { .. }
        | OrderError::NoSupplierOrders => StatusCode::BAD_REQUEST,
        OrderError::CustomerNotFound(_)
        | OrderError::SupplierOrdersNotFound { .. }
        | OrderError::ReconciliationOrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderError::DisplayIdTaken(_)
        | OrderError::SupplierOrdersAlreadyReconciling { .. }
        | OrderError::ReconciliationOrderFinalized(_)
        | OrderError::MissingDeliveryWarehouse(_) => StatusCode::CONFLICT,
        OrderError::Domain(err) => domain_status(err),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
