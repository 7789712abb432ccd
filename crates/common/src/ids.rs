//! Typed identifiers.
//!
//! Every relation uses a database-assigned `BIGINT` key. Wrapping each one in
//! its own type keeps a cart entry id from being passed where a product id is
//! expected.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw key.
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
            fn from(id: i64) -> Self {
                Self(id)
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
    /// Identity of a buyer or seller, as issued by the external identity layer.
    UserId
);
define_id!(
    /// Identifier of a listed product.
    ProductId
);
define_id!(
    /// Identifier of a cart entry.
    CartEntryId
);
define_id!(
    /// Identifier of an order. Assigned monotonically by the order ledger.
    OrderId
);
define_id!(
    /// Identifier of a single order line.
    OrderItemId
);
