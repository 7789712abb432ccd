//! Carts: availability rules, the mutation service and the read-only view.

mod availability;
mod service;
mod view;

pub use availability::{StaleEntry, UnavailableReason, classify_entry};
pub use service::CartService;
pub use view::{CartLine, CartView};
