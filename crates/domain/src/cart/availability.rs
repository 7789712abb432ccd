//! Stale-entry classification.

use common::{CartEntryId, ProductId};
use serde::{Deserialize, Serialize};
use store::{CartEntry, Product};

/// Why a cart entry cannot be bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailableReason {
    /// The product no longer exists.
    Missing,
    /// The product has been sold.
    Sold,
}

impl UnavailableReason {
    /// Returns the reason as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::Missing => "missing",
            UnavailableReason::Sold => "sold",
        }
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cart entry whose product is missing or already sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleEntry {
    pub entry_id: CartEntryId,
    pub product_id: ProductId,
    pub reason: UnavailableReason,
}

impl StaleEntry {
    pub fn new(entry: &CartEntry, reason: UnavailableReason) -> Self {
        Self {
            entry_id: entry.id,
            product_id: entry.product_id,
            reason,
        }
    }
}

/// Decides whether a cart entry is still purchasable.
///
/// `product` is the catalog's current view of the entry's product, or None
/// if it no longer exists.
pub fn classify_entry<'a>(
    entry: &CartEntry,
    product: Option<&'a Product>,
) -> Result<&'a Product, StaleEntry> {
    match product {
        None => Err(StaleEntry::new(entry, UnavailableReason::Missing)),
        Some(product) if product.sold => Err(StaleEntry::new(entry, UnavailableReason::Sold)),
        Some(product) => Ok(product),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Money, UserId};
    use store::NewProduct;

    fn entry() -> CartEntry {
        CartEntry {
            id: CartEntryId::new(1),
            user_id: UserId::new(2),
            product_id: ProductId::new(3),
            created_at: Utc::now(),
        }
    }

    fn product(sold: bool) -> Product {
        let new = NewProduct::new(UserId::new(9), "Lamp", Money::from_cents(100));
        Product {
            id: ProductId::new(3),
            seller_id: new.seller_id,
            title: new.title,
            description: None,
            price: new.price,
            condition: new.condition,
            category: None,
            image_url: None,
            sold,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_product_is_stale() {
        let stale = classify_entry(&entry(), None).unwrap_err();
        assert_eq!(stale.reason, UnavailableReason::Missing);
        assert_eq!(stale.product_id, ProductId::new(3));
    }

    #[test]
    fn sold_product_is_stale() {
        let p = product(true);
        let stale = classify_entry(&entry(), Some(&p)).unwrap_err();
        assert_eq!(stale.reason, UnavailableReason::Sold);
    }

    #[test]
    fn unsold_product_is_purchasable() {
        let p = product(false);
        assert_eq!(classify_entry(&entry(), Some(&p)).unwrap().id, p.id);
    }

    #[test]
    fn reason_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&UnavailableReason::Sold).unwrap(),
            "\"sold\""
        );
        assert_eq!(UnavailableReason::Missing.to_string(), "missing");
    }
}
