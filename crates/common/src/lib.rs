//! Shared types for the marketplace checkout core.
//!
//! - Typed identifiers for every persisted record
//! - `Money`, a non-negative decimal amount

pub mod ids;
pub mod money;

pub use ids::{CartEntryId, OrderId, OrderItemId, ProductId, UserId};
pub use money::{Money, MoneyError};
