//! Reconciliation configuration.

use common::WarehouseId;

/// Where finalized deliveries are booked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Warehouse that receives the stock of a finalized reconciliation.
    /// Without one the reconciliation note's lines carry no warehouse.
    pub delivery_warehouse: Option<WarehouseId>,
}

impl ReconciliationConfig {
    pub fn new(delivery_warehouse: Option<WarehouseId>) -> Self {
        Self { delivery_warehouse }
    }

    pub fn delivering_to(warehouse_id: WarehouseId) -> Self {
        Self::new(Some(warehouse_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_delivery_warehouse() {
        assert_eq!(ReconciliationConfig::default().delivery_warehouse, None);
    }

    #[test]
    fn delivering_to_sets_warehouse() {
        let config = ReconciliationConfig::delivering_to(WarehouseId::new(4));
        assert_eq!(config.delivery_warehouse, Some(WarehouseId::new(4)));
    }
}
