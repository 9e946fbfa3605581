//! Domain error types.

use common::{NoteId, WarehouseId};
use projections::ProjectionError;
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// A note line that has no warehouse assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoWarehouseLine {
    pub isbn: String,
    pub quantity: i64,
}

/// A note line asking for more copies than the warehouse holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfStockLine {
    pub isbn: String,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: Option<String>,
    pub quantity: i64,
    pub available: i64,
}

/// Every problem found while validating a note for commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteLineViolations {
    pub no_warehouse: Vec<NoWarehouseLine>,
    pub out_of_stock: Vec<OutOfStockLine>,
}

impl NoteLineViolations {
    /// Returns true if no violation was found.
    pub fn is_empty(&self) -> bool {
        self.no_warehouse.is_empty() && self.out_of_stock.is_empty()
    }

    /// Total number of offending lines.
    pub fn len(&self) -> usize {
        self.no_warehouse.len() + self.out_of_stock.len()
    }
}

impl std::fmt::Display for NoteLineViolations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} line(s) without a warehouse, {} line(s) out of stock",
            self.no_warehouse.len(),
            self.out_of_stock.len()
        )
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A book operation was attempted without an isbn.
    #[error("Book isbn is required")]
    MissingIsbn,

    /// A line quantity was zero or negative.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    /// The note does not exist.
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    /// The warehouse does not exist.
    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(WarehouseId),

    /// An outbound note failed commit validation.
    #[error("Invalid note lines: {0}")]
    InvalidNoteLines(NoteLineViolations),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An error occurred while computing stock.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// A query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_report_both_kinds() {
        let violations = NoteLineViolations {
            no_warehouse: vec![NoWarehouseLine {
                isbn: "A".into(),
                quantity: 1,
            }],
            out_of_stock: vec![OutOfStockLine {
                isbn: "B".into(),
                warehouse_id: WarehouseId::new(1),
                warehouse_name: None,
                quantity: 3,
                available: 2,
            }],
        };

        assert!(!violations.is_empty());
        assert_eq!(violations.len(), 2);
        assert_eq!(
            DomainError::InvalidNoteLines(violations).to_string(),
            "Invalid note lines: 1 line(s) without a warehouse, 1 line(s) out of stock"
        );
    }
}
