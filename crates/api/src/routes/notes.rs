//! Note ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{NoteId, WarehouseId};
use domain::{DomainError, Note, NoteEntry, NoteLine, NoteUpdate, Receipt};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateNoteRequest {
    /// Allocated when absent.
    pub id: Option<NoteId>,
    /// Inbound when set, outbound otherwise.
    pub warehouse_id: Option<WarehouseId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct NoteLinesResponse {
    pub entries: Vec<NoteEntry>,
    pub custom_items: Vec<domain::CustomItem>,
}

// -- Handlers --

/// POST /notes: creates a draft note with a default name.
#[tracing::instrument(skip(state))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let id = match req.id {
        Some(id) => id,
        None => state.notes.next_note_id().await?,
    };
    let note = state.notes.create(id, req.warehouse_id).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /notes/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Note>, ApiError> {
    let id = NoteId::new(id);
    let note = state
        .notes
        .get_note(id)
        .await?
        .ok_or(DomainError::NoteNotFound(id))?;
    Ok(Json(note))
}

/// PUT /notes/{id}: renames a draft note or sets its default warehouse.
#[tracing::instrument(skip(state))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<NoteUpdate>,
) -> Result<StatusCode, ApiError> {
    state.notes.update_note(NoteId::new(id), update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /notes/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.notes.delete(NoteId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /notes/{id}/lines: book lines and custom items.
#[tracing::instrument(skip(state))]
pub async fn entries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<NoteLinesResponse>, ApiError> {
    let id = NoteId::new(id);
    Ok(Json(NoteLinesResponse {
        entries: state.notes.note_entries(id).await?,
        custom_items: state.notes.custom_items(id).await?,
    }))
}

/// POST /notes/{id}/lines: adds book lines and custom items to a draft.
#[tracing::instrument(skip(state, lines), fields(lines = lines.len()))]
pub async fn add_lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(lines): Json<Vec<NoteLine>>,
) -> Result<StatusCode, ApiError> {
    state.notes.add_volumes(NoteId::new(id), &lines).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /notes/{id}/commit: 422 with every offending line when an outbound note is invalid.
#[tracing::instrument(skip(state))]
pub async fn commit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Note>, ApiError> {
    let id = NoteId::new(id);
    state.notes.commit(id).await?;
    let note = state
        .notes
        .get_note(id)
        .await?
        .ok_or(DomainError::NoteNotFound(id))?;
    Ok(Json(note))
}

/// GET /notes/{id}/receipt
#[tracing::instrument(skip(state))]
pub async fn receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Receipt>, ApiError> {
    Ok(Json(state.notes.receipt(NoteId::new(id)).await?))
}
