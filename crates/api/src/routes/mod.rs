//! HTTP handlers, one module per resource.

pub mod customers;
pub mod notes;
pub mod reconciliation;
pub mod stock;
pub mod supplier_orders;
pub mod system;
pub mod warehouses;
