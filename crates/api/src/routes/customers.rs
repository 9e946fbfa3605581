//! Customer and customer order line endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CustomerId, CustomerOrderLineId};
use orders::{Customer, CustomerOrderLine, CustomerUpsert, OrderError};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddBooksRequest {
    pub isbns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LineIdsRequest {
    pub line_ids: Vec<CustomerOrderLineId>,
}

#[derive(Serialize)]
pub struct AddBooksResponse {
    pub line_ids: Vec<CustomerOrderLineId>,
}

#[derive(Serialize)]
pub struct CollectResponse {
    pub collected: u64,
}

/// GET /customers
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.customers.list_customers().await?))
}

/// GET /customers/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    let id = CustomerId::new(id);
    let customer = state
        .customers
        .get_customer(id)
        .await?
        .ok_or(OrderError::CustomerNotFound(id))?;
    Ok(Json(customer))
}

/// PUT /customers/{id}: creates or merges a customer; the display id must be unique.
#[tracing::instrument(skip(state))]
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(customer): Json<CustomerUpsert>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .customers
        .upsert_customer(CustomerId::new(id), customer)
        .await?;
    Ok(Json(customer))
}

/// POST /customers/{id}/books: one pending order line per isbn.
#[tracing::instrument(skip(state))]
pub async fn add_books(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AddBooksRequest>,
) -> Result<(StatusCode, Json<AddBooksResponse>), ApiError> {
    let line_ids = state
        .customers
        .add_books_to_customer(CustomerId::new(id), &req.isbns)
        .await?;
    Ok((StatusCode::CREATED, Json(AddBooksResponse { line_ids })))
}

/// DELETE /customers/{id}/books
#[tracing::instrument(skip(state))]
pub async fn remove_books(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<LineIdsRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .customers
        .remove_books_from_customer(CustomerId::new(id), &req.line_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /customers/{id}/lines
#[tracing::instrument(skip(state))]
pub async fn lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CustomerOrderLine>>, ApiError> {
    Ok(Json(
        state
            .customers
            .customer_order_lines(CustomerId::new(id))
            .await?,
    ))
}

/// POST /customer-lines/collect: marks received lines as collected.
#[tracing::instrument(skip(state))]
pub async fn collect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LineIdsRequest>,
) -> Result<Json<CollectResponse>, ApiError> {
    let collected = state.customers.mark_collected(&req.line_ids).await?;
    Ok(Json(CollectResponse { collected }))
}
