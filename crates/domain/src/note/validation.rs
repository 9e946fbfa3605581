//! Commit-time checks for outbound notes.

use std::collections::HashMap;

use common::WarehouseId;
use projections::StockEntry;

use crate::error::{NoWarehouseLine, NoteLineViolations, OutOfStockLine};

/// A book line as it will be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLine {
    pub isbn: String,
    pub warehouse_id: Option<WarehouseId>,
    pub warehouse_name: Option<String>,
    pub quantity: i64,
}

/// Checks every line against current stock and collects all violations.
///
/// A line without a warehouse is reported as such and not checked for
/// stock. A line whose pair has no stock row has 0 available.
pub fn collect_violations(lines: &[PendingLine], stock: &[StockEntry]) -> NoteLineViolations {
    let available: HashMap<(&str, WarehouseId), i64> = stock
        .iter()
        .filter_map(|entry| {
            entry
                .warehouse_id
                .map(|wh| ((entry.isbn.as_str(), wh), entry.quantity))
        })
        .collect();

    let mut violations = NoteLineViolations::default();
    for line in lines {
        let Some(warehouse_id) = line.warehouse_id else {
            violations.no_warehouse.push(NoWarehouseLine {
                isbn: line.isbn.clone(),
                quantity: line.quantity,
            });
            continue;
        };

        let in_stock = available
            .get(&(line.isbn.as_str(), warehouse_id))
            .copied()
            .unwrap_or(0);
        if line.quantity > in_stock {
            violations.out_of_stock.push(OutOfStockLine {
                isbn: line.isbn.clone(),
                warehouse_id,
                warehouse_name: line.warehouse_name.clone(),
                quantity: line.quantity,
                available: in_stock,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use projections::BookMeta;

    fn line(isbn: &str, warehouse: Option<i64>, quantity: i64) -> PendingLine {
        PendingLine {
            isbn: isbn.to_string(),
            warehouse_id: warehouse.map(WarehouseId::new),
            warehouse_name: None,
            quantity,
        }
    }

    fn stock(isbn: &str, warehouse: i64, quantity: i64) -> StockEntry {
        StockEntry {
            isbn: isbn.to_string(),
            warehouse_id: Some(WarehouseId::new(warehouse)),
            warehouse_name: None,
            warehouse_discount: 0.0,
            quantity,
            book: BookMeta::default(),
        }
    }

    #[test]
    fn enough_stock_passes() {
        let violations = collect_violations(&[line("A", Some(1), 10)], &[stock("A", 1, 10)]);
        assert!(violations.is_empty());
    }

    #[test]
    fn reports_available_quantity() {
        let violations = collect_violations(&[line("A", Some(1), 12)], &[stock("A", 1, 10)]);
        assert_eq!(violations.out_of_stock.len(), 1);
        assert_eq!(violations.out_of_stock[0].available, 10);
        assert_eq!(violations.out_of_stock[0].quantity, 12);
    }

    #[test]
    fn missing_stock_row_means_zero_available() {
        let violations = collect_violations(&[line("A", Some(2), 1)], &[stock("A", 1, 10)]);
        assert_eq!(violations.out_of_stock[0].available, 0);
    }

    #[test]
    fn collects_every_violation_at_once() {
        let lines = [
            line("A", None, 1),
            line("B", Some(1), 5),
            line("C", Some(1), 1),
            line("D", None, 2),
        ];
        let violations = collect_violations(&lines, &[stock("B", 1, 4), stock("C", 1, 1)]);

        assert_eq!(violations.no_warehouse.len(), 2);
        assert_eq!(violations.out_of_stock.len(), 1);
        assert_eq!(violations.out_of_stock[0].isbn, "B");
        assert_eq!(violations.len(), 3);
    }
}
