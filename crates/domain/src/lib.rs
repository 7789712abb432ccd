//! Domain layer for the marketplace checkout core.
//!
//! This crate provides:
//! - The cart mutation service (add, remove, read-only cart view)
//! - Stale-entry classification shared with the checkout engine
//! - The error taxonomy (`ErrorKind`) used by every layer above the stores

pub mod cart;
pub mod error;

pub use cart::{
    CartLine, CartService, CartView, StaleEntry, UnavailableReason, classify_entry,
};
pub use error::{CartError, ErrorKind};
