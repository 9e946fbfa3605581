//! Order pipeline for the bookstock ledger.
//!
//! Books requested by customers flow through three stages:
//! 1. customer order lines are created for each requested book
//! 2. supplier orders place the oldest unplaced lines, grouped by supplier
//! 3. reconciliation matches a delivery to placed orders, marks lines as
//!    received and books the delivered stock as a reconciliation note

pub mod config;
pub mod customer;
pub mod error;
pub mod reconciliation;
pub mod status;
pub mod supplier;

pub use config::ReconciliationConfig;
pub use customer::{
    Customer, CustomerOrderLine, CustomerService, CustomerUpsert, OrderLinePlacement,
};
pub use error::{OrderError, ReconciliationConflict, Result};
pub use reconciliation::{
    DeliveryReport, Finalization, ProcessedOrderLine, ReconciliationOrder,
    ReconciliationOrderLine, ReconciliationService, process_order_delivery,
};
pub use status::OrderLineStatus;
pub use supplier::{
    BookQuantity, DEFAULT_SUPPLIER_NAME, PlacedSupplierOrder, PlacedSupplierOrderLine,
    PossibleSupplierOrder, PossibleSupplierOrderLine, Supplier, SupplierService, SupplierUpdate,
};
