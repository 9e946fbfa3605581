//! Note line inputs and read models.

use chrono::{DateTime, Utc};
use common::{NoteId, ReconciliationOrderId, WarehouseId};
use serde::{Deserialize, Serialize};

use super::{NoteKind, NoteState};
use crate::{DomainError, Result};

/// A quantity of one book, optionally in a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub isbn: String,
    pub quantity: i64,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
}

impl Volume {
    pub fn new(isbn: impl Into<String>, quantity: i64) -> Self {
        Self {
            isbn: isbn.into(),
            quantity,
            warehouse_id: None,
        }
    }

    pub fn in_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    /// Checks the isbn and quantity.
    pub fn validate(&self) -> Result<()> {
        if self.isbn.trim().is_empty() {
            return Err(DomainError::MissingIsbn);
        }
        if self.quantity <= 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}

/// A non-catalog item. It never carries an id: one is assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomItem {
    pub title: String,
    pub price: f64,
}

/// One line to add to a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteLine {
    Book(Volume),
    Custom(NewCustomItem),
}

impl NoteLine {
    pub fn book(isbn: impl Into<String>, quantity: i64) -> Self {
        NoteLine::Book(Volume::new(isbn, quantity))
    }

    pub fn book_in(isbn: impl Into<String>, quantity: i64, warehouse_id: WarehouseId) -> Self {
        NoteLine::Book(Volume::new(isbn, quantity).in_warehouse(warehouse_id))
    }

    pub fn custom(title: impl Into<String>, price: f64) -> Self {
        NoteLine::Custom(NewCustomItem {
            title: title.into(),
            price,
        })
    }
}

impl From<Volume> for NoteLine {
    fn from(volume: Volume) -> Self {
        NoteLine::Book(volume)
    }
}

/// New warehouse and quantity for an existing book line.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TransactionUpdate {
    pub warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
}

/// Note metadata to change. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NoteUpdate {
    pub display_name: Option<String>,
    pub default_warehouse: Option<WarehouseId>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.default_warehouse.is_none()
    }
}

/// A note header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: NoteId,
    pub display_name: String,
    pub kind: NoteKind,
    pub state: NoteState,
    pub warehouse_id: Option<WarehouseId>,
    pub warehouse_name: Option<String>,
    pub default_warehouse: Option<WarehouseId>,
    pub reconciliation_order_id: Option<ReconciliationOrderId>,
    pub committed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn is_committed(&self) -> bool {
        self.state == NoteState::Committed
    }
}

/// A draft note in a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteSummary {
    pub id: NoteId,
    pub display_name: String,
    pub warehouse_id: Option<WarehouseId>,
    pub warehouse_name: Option<String>,
    pub total_books: i64,
    pub updated_at: DateTime<Utc>,
}

/// A book line with catalog and warehouse details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteEntry {
    pub isbn: String,
    pub quantity: i64,
    pub warehouse_id: Option<WarehouseId>,
    pub warehouse_name: Option<String>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A stored custom item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomItem {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// One printable receipt line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptItem {
    pub isbn: Option<String>,
    pub title: String,
    pub quantity: i64,
    pub price: f64,
    /// Percentage, 0..=100.
    pub discount: f64,
}

impl ReceiptItem {
    /// Line total after discount.
    pub fn total(&self) -> f64 {
        self.price * self.quantity as f64 * (100.0 - self.discount) / 100.0
    }
}

/// Receipt for a note: book lines followed by custom items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub items: Vec<ReceiptItem>,
    pub timestamp: DateTime<Utc>,
}

impl Receipt {
    pub fn total(&self) -> f64 {
        self.items.iter().map(ReceiptItem::total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_validation() {
        assert!(Volume::new("111", 1).validate().is_ok());
        assert!(matches!(
            Volume::new("", 1).validate(),
            Err(DomainError::MissingIsbn)
        ));
        assert!(matches!(
            Volume::new("111", 0).validate(),
            Err(DomainError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn lines_deserialize_by_shape() {
        let lines: Vec<NoteLine> = serde_json::from_str(
            r#"[
                {"isbn": "111", "quantity": 2},
                {"isbn": "222", "quantity": 1, "warehouse_id": 3},
                {"title": "Tote bag", "price": 5.0}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            lines,
            vec![
                NoteLine::book("111", 2),
                NoteLine::book_in("222", 1, WarehouseId::new(3)),
                NoteLine::custom("Tote bag", 5.0),
            ]
        );
    }

    #[test]
    fn custom_item_ids_are_ignored_on_input() {
        let line: NoteLine =
            serde_json::from_str(r#"{"id": 1, "title": "Gift wrap", "price": 2.0}"#).unwrap();
        assert_eq!(line, NoteLine::custom("Gift wrap", 2.0));
    }

    #[test]
    fn receipt_totals_apply_discount() {
        let receipt = Receipt {
            items: vec![
                ReceiptItem {
                    isbn: Some("111".into()),
                    title: "Dune".into(),
                    quantity: 2,
                    price: 10.0,
                    discount: 50.0,
                },
                ReceiptItem {
                    isbn: None,
                    title: "Tote bag".into(),
                    quantity: 1,
                    price: 5.0,
                    discount: 0.0,
                },
            ],
            timestamp: Utc::now(),
        };
        assert_eq!(receipt.total(), 15.0);
    }
}
