//! Supplier and supplier order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{SupplierId, SupplierOrderId};
use orders::{
    BookQuantity, PlacedSupplierOrder, PossibleSupplierOrder, PossibleSupplierOrderLine, Supplier,
    SupplierUpdate,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct SupplierQuery {
    /// Omitted for the general bucket or for every supplier.
    pub supplier_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PublisherRequest {
    pub publisher: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierOrderRequest {
    pub supplier_id: Option<SupplierId>,
    pub lines: Vec<BookQuantity>,
}

#[derive(Serialize)]
pub struct SupplierOrderCreatedResponse {
    pub id: SupplierOrderId,
}

/// GET /suppliers
#[tracing::instrument(skip(state))]
pub async fn list_suppliers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Supplier>>, ApiError> {
    Ok(Json(state.suppliers.list_suppliers().await?))
}

/// PUT /suppliers/{id}
#[tracing::instrument(skip(state))]
pub async fn upsert_supplier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<SupplierUpdate>,
) -> Result<Json<Supplier>, ApiError> {
    let supplier = state
        .suppliers
        .upsert_supplier(SupplierId::new(id), update)
        .await?;
    Ok(Json(supplier))
}

/// GET /suppliers/{id}/publishers
#[tracing::instrument(skip(state))]
pub async fn publishers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.suppliers.publishers_for(SupplierId::new(id)).await?))
}

/// POST /suppliers/{id}/publishers: routes a publisher to this supplier.
#[tracing::instrument(skip(state))]
pub async fn associate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<PublisherRequest>,
) -> Result<StatusCode, ApiError> {
    if req.publisher.trim().is_empty() {
        return Err(ApiError::BadRequest("publisher is required".to_string()));
    }
    state
        .suppliers
        .associate_publisher(SupplierId::new(id), req.publisher.trim())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /supplier-orders/possible: unplaced demand grouped by supplier.
#[tracing::instrument(skip(state))]
pub async fn possible(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PossibleSupplierOrder>>, ApiError> {
    Ok(Json(state.suppliers.possible_supplier_orders().await?))
}

/// GET /supplier-orders/possible/lines?supplier_id=
#[tracing::instrument(skip(state))]
pub async fn possible_lines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SupplierQuery>,
) -> Result<Json<Vec<PossibleSupplierOrderLine>>, ApiError> {
    let lines = state
        .suppliers
        .possible_supplier_order_lines(query.supplier_id.map(SupplierId::new))
        .await?;
    Ok(Json(lines))
}

/// POST /supplier-orders: places the oldest waiting customer lines.
#[tracing::instrument(skip(state))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSupplierOrderRequest>,
) -> Result<(StatusCode, Json<SupplierOrderCreatedResponse>), ApiError> {
    let id = state
        .suppliers
        .create_supplier_order(req.supplier_id, &req.lines)
        .await?;
    Ok((StatusCode::CREATED, Json(SupplierOrderCreatedResponse { id })))
}

/// GET /supplier-orders?supplier_id=: placed orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn placed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SupplierQuery>,
) -> Result<Json<Vec<PlacedSupplierOrder>>, ApiError> {
    let orders = state
        .suppliers
        .placed_supplier_orders(query.supplier_id.map(SupplierId::new))
        .await?;
    Ok(Json(orders))
}
