//! Read side of the ledger.
//!
//! Stock is never stored. Every read re-derives it from committed notes:
//! - [`StockView`] answers per-(book, warehouse) quantity queries
//! - [`stock_entries`] and [`warehouse_totals`] run the same queries on a
//!   caller-provided connection, so writers can validate inside their own
//!   transaction

pub mod error;
pub mod views;

pub use error::{ProjectionError, Result};
pub use views::{
    BookMeta, StockEntry, StockFilter, StockView, WarehouseTotal, stock_entries, warehouse_totals,
};
