//! Reconciliation order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ReconciliationOrderId, SupplierOrderId};
use orders::{
    BookQuantity, DeliveryReport, Finalization, OrderError, ReconciliationOrder,
    ReconciliationOrderLine, process_order_delivery,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub finalized: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReconciliationRequest {
    pub id: ReconciliationOrderId,
    pub supplier_order_ids: Vec<SupplierOrderId>,
}

/// GET /reconciliation-orders?finalized=
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ReconciliationOrder>>, ApiError> {
    let orders = state
        .reconciliation
        .list_reconciliation_orders(query.finalized)
        .await?;
    Ok(Json(orders))
}

/// POST /reconciliation-orders
#[tracing::instrument(skip(state))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReconciliationRequest>,
) -> Result<(StatusCode, Json<ReconciliationOrder>), ApiError> {
    let order = state
        .reconciliation
        .create_reconciliation_order(req.id, &req.supplier_order_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /reconciliation-orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ReconciliationOrder>, ApiError> {
    Ok(Json(load(&state, ReconciliationOrderId::new(id)).await?))
}

/// DELETE /reconciliation-orders/{id}: only while the order is open.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .reconciliation
        .delete_reconciliation_order(ReconciliationOrderId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /reconciliation-orders/{id}/lines
#[tracing::instrument(skip(state))]
pub async fn lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ReconciliationOrderLine>>, ApiError> {
    let lines = state
        .reconciliation
        .reconciliation_order_lines(ReconciliationOrderId::new(id))
        .await?;
    Ok(Json(lines))
}

/// POST /reconciliation-orders/{id}/lines: adds scanned books.
#[tracing::instrument(skip(state, lines), fields(lines = lines.len()))]
pub async fn add_lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(lines): Json<Vec<BookQuantity>>,
) -> Result<StatusCode, ApiError> {
    state
        .reconciliation
        .add_order_lines(ReconciliationOrderId::new(id), &lines)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /reconciliation-orders/{id}/lines/{isbn}
#[tracing::instrument(skip(state))]
pub async fn remove_line(
    State(state): State<Arc<AppState>>,
    Path((id, isbn)): Path<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .reconciliation
        .remove_order_line(ReconciliationOrderId::new(id), &isbn)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /reconciliation-orders/{id}/delivery: scanned books matched against
/// the placed supplier order lines, without changing anything.
#[tracing::instrument(skip(state))]
pub async fn delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeliveryReport>, ApiError> {
    let order = load(&state, ReconciliationOrderId::new(id)).await?;
    let scanned: Vec<BookQuantity> = state
        .reconciliation
        .reconciliation_order_lines(order.id)
        .await?
        .into_iter()
        .map(|line| BookQuantity::new(line.isbn, line.quantity))
        .collect();
    let placed = state
        .suppliers
        .placed_supplier_order_lines(&order.supplier_order_ids)
        .await?;

    Ok(Json(process_order_delivery(&scanned, &placed)))
}

/// POST /reconciliation-orders/{id}/finalize
#[tracing::instrument(skip(state))]
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Finalization>, ApiError> {
    let finalization = state
        .reconciliation
        .finalize_reconciliation_order(ReconciliationOrderId::new(id))
        .await?;
    Ok(Json(finalization))
}

async fn load(state: &AppState, id: ReconciliationOrderId) -> Result<ReconciliationOrder, ApiError> {
    let order = state
        .reconciliation
        .get_reconciliation_order(id)
        .await?
        .ok_or(OrderError::ReconciliationOrderNotFound(id))?;
    Ok(order)
}
