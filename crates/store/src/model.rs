//! Records held by the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartEntryId, Money, OrderId, OrderItemId, ProductId, UserId};

/// A listed, unique item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub price: Money,
    pub condition: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// Set once by a checkout. Only that checkout's own compensation clears it.
    pub sold: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product to be listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub seller_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub price: Money,
    pub condition: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Creates a listing with the required fields; condition defaults to `"used"`.
    pub fn new(seller_id: UserId, title: impl Into<String>, price: Money) -> Self {
        Self {
            seller_id,
            title: title.into(),
            description: None,
            price,
            condition: "used".to_string(),
            category: None,
            image_url: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// A product reference in a buyer's cart. Confers no claim on the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: CartEntryId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

/// A completed, immutable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Sum of `price_at_sale` over `items`.
    pub total_amount: Money,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Returns the line for a product, if this order sold it.
    pub fn item_for(&self, product_id: ProductId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}

/// A single order line. Exactly one product per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub price_at_sale: Money,
    pub title_at_sale: String,
}

/// An order ready to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Returns the order total: the sum of the line prices.
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(|item| item.price_at_sale).sum()
    }
}

/// A line of a [`NewOrder`], priced at the instant the product was claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub price_at_sale: Money,
    pub title_at_sale: String,
}

impl From<&Product> for NewOrderItem {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            price_at_sale: product.price,
            title_at_sale: product.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, cents: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId::new(id),
            price_at_sale: Money::from_cents(cents),
            title_at_sale: format!("item {id}"),
        }
    }

    #[test]
    fn new_order_total_is_sum_of_lines() {
        let order = NewOrder {
            user_id: UserId::new(1),
            shipping_address: "1 Main St".to_string(),
            created_at: Utc::now(),
            items: vec![line(1, 1000), line(2, 1500)],
        };
        assert_eq!(order.total_amount(), Money::from_cents(2500));
    }

    #[test]
    fn empty_order_total_is_zero() {
        let order = NewOrder {
            user_id: UserId::new(1),
            shipping_address: String::new(),
            created_at: Utc::now(),
            items: vec![],
        };
        assert!(order.total_amount().is_zero());
    }

    #[test]
    fn new_product_builder() {
        let product = NewProduct::new(UserId::new(3), "Lamp", Money::from_cents(999))
            .condition("like new")
            .category("home")
            .description("Brass desk lamp");
        assert_eq!(product.condition, "like new");
        assert_eq!(product.category.as_deref(), Some("home"));
        assert_eq!(product.description.as_deref(), Some("Brass desk lamp"));
        assert!(product.image_url.is_none());
    }
}
