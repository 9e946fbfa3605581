//! Shared types for the bookstock workspace.
//!
//! Every persisted relation is expressed by id lookup, so the identifiers
//! here are the only thing the other crates share about each entity.

pub mod ids;
pub mod time;

pub use ids::{
    CustomerId, CustomerOrderLineId, NoteId, ReconciliationOrderId, SupplierId, SupplierOrderId,
    WarehouseId,
};
pub use time::{from_millis, now_millis, to_millis};
