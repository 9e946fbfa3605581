//! Order pipeline error types.

use common::{CustomerId, ReconciliationOrderId, SupplierId, SupplierOrderId};
use domain::DomainError;
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// A reconciliation order that already covers some of the requested supplier orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationConflict {
    pub reconciliation_order_id: ReconciliationOrderId,
    /// Only the supplier order ids that overlap with the request.
    pub supplier_order_ids: Vec<SupplierOrderId>,
}

/// Errors that can occur in the order pipeline.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A customer was upserted without a display id.
    #[error("Customer display id is required")]
    MissingCustomerDisplayId,

    /// Another customer already uses the display id.
    #[error("Customer display id already taken: {0}")]
    DisplayIdTaken(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// An order operation was called with no books.
    #[error("No books provided")]
    NoBooksProvided,

    #[error("Book line without an isbn")]
    MissingIsbn,

    /// A supplier order was requested with no lines.
    #[error("Supplier order must have at least one line")]
    NoOrderLines,

    #[error("Invalid quantity for {isbn}: {quantity}")]
    InvalidQuantity { isbn: String, quantity: i64 },

    /// A new supplier was upserted without a name.
    #[error("Supplier name is required: {0}")]
    MissingSupplierName(SupplierId),

    /// Supplier order lines must all be routed to the order's supplier.
    #[error("Book {isbn} belongs to supplier {actual:?}, not {expected:?}")]
    SupplierMismatch {
        isbn: String,
        expected: Option<SupplierId>,
        actual: Option<SupplierId>,
    },

    /// A reconciliation order was requested for no supplier orders.
    #[error("Reconciliation order must be based on at least one supplier order")]
    NoSupplierOrders,

    #[error("Supplier orders not found: provided {provided:?}, found {found:?}")]
    SupplierOrdersNotFound {
        provided: Vec<SupplierOrderId>,
        found: Vec<SupplierOrderId>,
    },

    #[error("Supplier orders already being reconciled by {} reconciliation order(s)", conflicts.len())]
    SupplierOrdersAlreadyReconciling {
        conflicts: Vec<ReconciliationConflict>,
    },

    #[error("Reconciliation order not found: {0}")]
    ReconciliationOrderNotFound(ReconciliationOrderId),

    /// Finalized reconciliation orders are immutable.
    #[error("Reconciliation order already finalized: {0}")]
    ReconciliationOrderFinalized(ReconciliationOrderId),

    /// Delivered books need a warehouse to be booked into.
    #[error("No delivery warehouse configured to finalize reconciliation order {0}")]
    MissingDeliveryWarehouse(ReconciliationOrderId),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for order pipeline results.
pub type Result<T> = std::result::Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_counts_orders() {
        let err = OrderError::SupplierOrdersAlreadyReconciling {
            conflicts: vec![ReconciliationConflict {
                reconciliation_order_id: ReconciliationOrderId::new(1),
                supplier_order_ids: vec![SupplierOrderId::new(2)],
            }],
        };
        assert_eq!(
            err.to_string(),
            "Supplier orders already being reconciled by 1 reconciliation order(s)"
        );
    }
}
