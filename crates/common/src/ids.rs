use serde::{Deserialize, Serialize};

/// Declares an integer-backed identifier newtype.
///
/// Ids are plain `i64` in the database; the wrappers keep a warehouse id
/// from being passed where a note id is expected.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an id from its raw database value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw database value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifies a warehouse (a logical grouping of stock).
    WarehouseId
);

define_id!(
    /// Identifies a note in the ledger.
    NoteId
);

define_id!(
    /// Identifies a customer.
    CustomerId
);

define_id!(
    /// Identifies a single customer order line (one book for one customer).
    CustomerOrderLineId
);

define_id!(
    /// Identifies a supplier.
    SupplierId
);

define_id!(
    /// Identifies a placed supplier order.
    SupplierOrderId
);

define_id!(
    /// Identifies a reconciliation order.
    ReconciliationOrderId
);
