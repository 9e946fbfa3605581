//! Read model views.

pub mod stock;

pub use stock::{
    BookMeta, StockEntry, StockFilter, StockView, WarehouseTotal, stock_entries, warehouse_totals,
};
