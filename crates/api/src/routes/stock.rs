//! Stock and catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::WarehouseId;
use domain::Book;
use projections::{StockEntry, StockFilter};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub search: Option<String>,
    /// Comma separated.
    pub isbns: Option<String>,
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    pub search: Option<String>,
    /// Comma separated.
    pub isbns: Option<String>,
}

fn split_isbns(isbns: &str) -> Vec<String> {
    isbns
        .split(',')
        .map(str::trim)
        .filter(|isbn| !isbn.is_empty())
        .map(String::from)
        .collect()
}

/// GET /stock: current stock computed from committed notes.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StockQuery>,
) -> Result<Json<Vec<StockEntry>>, ApiError> {
    let mut filter = StockFilter::new();
    if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        filter = filter.search(search);
    }
    if let Some(isbns) = query.isbns.as_deref() {
        filter = filter.isbns(split_isbns(isbns));
    }
    if let Some(id) = query.warehouse_id {
        filter = filter.warehouse(WarehouseId::new(id));
    }

    Ok(Json(state.stock.get_stock(&filter).await?))
}

/// GET /books: search the catalog, or fetch an explicit isbn list.
#[tracing::instrument(skip(state))]
pub async fn search_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookQuery>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let books = match query.isbns.as_deref() {
        Some(isbns) => state.books.get_books(&split_isbns(isbns)).await?,
        None => {
            state
                .books
                .search_books(query.search.as_deref().unwrap_or_default())
                .await?
        }
    };
    Ok(Json(books))
}

/// GET /books/{isbn}
#[tracing::instrument(skip(state))]
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let book = state
        .books
        .get_book(&isbn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Book {isbn} not found")))?;
    Ok(Json(book))
}

/// PUT /books/{isbn}: merges the provided fields into the catalog entry.
#[tracing::instrument(skip(state, book))]
pub async fn upsert_book(
    State(state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
    Json(mut book): Json<Book>,
) -> Result<StatusCode, ApiError> {
    book.isbn = isbn;
    state.books.upsert_book(&book).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /publishers
#[tracing::instrument(skip(state))]
pub async fn publishers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.books.publisher_list().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_isbns() {
        assert_eq!(split_isbns("111, 222,,333 "), vec!["111", "222", "333"]);
        assert!(split_isbns("").is_empty());
    }
}
