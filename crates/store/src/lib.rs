//! Durable stores for the marketplace checkout core.
//!
//! Three relations back the checkout engine:
//! - the catalog (products and their sold flag)
//! - carts (per-user product references)
//! - the order ledger (append-only orders and their lines)
//!
//! Each relation is a trait so the engine can run against the in-memory
//! implementation in tests and against PostgreSQL in production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{CartEntryId, Money, OrderId, OrderItemId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{CartEntry, NewOrder, NewOrderItem, NewProduct, Order, OrderItem, Product};
pub use postgres::PostgresStore;
pub use store::{CartStore, CatalogStore, OrderLedger};
