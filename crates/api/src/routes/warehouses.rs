//! Warehouse endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::WarehouseId;
use domain::{DomainError, Warehouse, WarehouseUpdate};

use crate::AppState;
use crate::error::ApiError;

/// GET /warehouses: every warehouse with its committed stock total.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Warehouse>>, ApiError> {
    Ok(Json(state.warehouses.list_warehouses().await?))
}

/// GET /warehouses/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Warehouse>, ApiError> {
    let id = WarehouseId::new(id);
    let warehouse = state
        .warehouses
        .get_warehouse(id)
        .await?
        .ok_or(DomainError::WarehouseNotFound(id))?;
    Ok(Json(warehouse))
}

/// PUT /warehouses/{id}: creates or renames a warehouse, or changes its discount.
#[tracing::instrument(skip(state))]
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<WarehouseUpdate>,
) -> Result<Json<Warehouse>, ApiError> {
    let id = WarehouseId::new(id);
    state.warehouses.upsert_warehouse(id, update).await?;
    let warehouse = state
        .warehouses
        .get_warehouse(id)
        .await?
        .ok_or(DomainError::WarehouseNotFound(id))?;
    Ok(Json(warehouse))
}

/// DELETE /warehouses/{id}: removes the warehouse row; its notes are kept.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.warehouses.delete_warehouse(WarehouseId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
