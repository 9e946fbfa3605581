//! Relational store for the bookstock workspace.
//!
//! This crate owns the connection pool, the schema migrations and the
//! transaction scope. Everything above it talks SQL with bound parameters
//! through the helpers re-exported here.

pub mod config;
pub mod error;
pub mod sql;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use sql::placeholders;
pub use store::{Connection, Store, Tx};
