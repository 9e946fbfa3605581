//! Domain layer for the bookstock ledger.
//!
//! This crate provides:
//! - the sequence allocator for default display names
//! - the book catalog and warehouses
//! - the note ledger, whose committed notes are the only source of stock

pub mod book;
pub mod error;
pub mod note;
pub mod sequence;
pub mod warehouse;

pub use book::{Book, BookCatalog};
pub use error::{DomainError, NoWarehouseLine, NoteLineViolations, OutOfStockLine, Result};
pub use note::{
    CustomItem, NewCustomItem, Note, NoteEntry, NoteKind, NoteLedger, NoteLine, NoteState,
    NoteSummary, NoteUpdate, Receipt, ReceiptItem, TransactionUpdate, Volume,
};
pub use sequence::next_sequence_name;
pub use warehouse::{Warehouse, WarehouseService, WarehouseUpdate};
