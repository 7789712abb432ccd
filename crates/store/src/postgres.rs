use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    CartEntry, CartEntryId, Money, NewOrder, NewProduct, Order, OrderId, OrderItem, OrderItemId,
    Product, ProductId, Result, StoreError, UserId,
    store::{CartStore, CatalogStore, OrderLedger},
};

const PRODUCT_COLUMNS: &str = "id, seller_id, title, description, price, condition, category, \
     image_url, is_sold, created_at, updated_at";

/// PostgreSQL-backed implementation of all three stores.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::debug!("marketplace migrations up to date");
        Ok(())
    }

    fn money(amount: Decimal) -> Result<Money> {
        Money::new(amount).map_err(|e| StoreError::Integrity(e.to_string()))
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            seller_id: UserId::new(row.try_get("seller_id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: Self::money(row.try_get("price")?)?,
            condition: row.try_get("condition")?,
            category: row.try_get("category")?,
            image_url: row.try_get("image_url")?,
            sold: row.try_get("is_sold")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_cart_entry(row: PgRow) -> Result<CartEntry> {
        Ok(CartEntry {
            id: CartEntryId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            price_at_sale: Self::money(row.try_get("price_at_sale")?)?,
            title_at_sale: row.try_get("title_at_sale")?,
        })
    }

    /// Loads the orders matching `order_rows` together with their lines.
    async fn attach_items(&self, order_rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if order_rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = order_rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, price_at_sale, title_at_sale
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let item = Self::row_to_order_item(row)?;
            items.entry(item.order_id).or_default().push(item);
        }

        order_rows
            .into_iter()
            .map(|row| {
                let id = OrderId::new(row.try_get("id")?);
                Ok(Order {
                    id,
                    user_id: UserId::new(row.try_get("user_id")?),
                    total_amount: Self::money(row.try_get("total_amount")?)?,
                    shipping_address: row.try_get("shipping_address")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                    items: items.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(id.as_i64())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Checks, under a row lock, that a product is sold and free to be
    /// recorded on a new order line.
    async fn lock_sold_product(tx: &mut Transaction<'_, Postgres>, id: ProductId) -> Result<()> {
        let sold: Option<bool> =
            sqlx::query_scalar("SELECT is_sold FROM products WHERE id = $1 FOR SHARE")
                .bind(id.as_i64())
                .fetch_optional(&mut **tx)
                .await?;

        match sold {
            Some(true) => Ok(()),
            Some(false) => Err(StoreError::Integrity(format!(
                "product {id} is not marked sold"
            ))),
            None => Err(StoreError::ProductNotFound(id)),
        }
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn mark_sold(&self, id: ProductId) -> Result<Product> {
        // The WHERE clause is the compare-and-set: only one claimant can flip the row.
        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET is_sold = TRUE, updated_at = NOW()
            WHERE id = $1 AND is_sold = FALSE
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None if self.product_exists(id).await? => {
                tracing::debug!(product_id = %id, "claim lost, product already sold");
                Err(StoreError::Conflict(id))
            }
            None => Err(StoreError::ProductNotFound(id)),
        }
    }

    async fn release(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET is_sold = FALSE, updated_at = NOW()
            WHERE id = $1
              AND is_sold = TRUE
              AND NOT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else if self.product_exists(id).await? {
            Err(StoreError::Conflict(id))
        } else {
            Err(StoreError::ProductNotFound(id))
        }
    }

    async fn list_product(&self, new: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (seller_id, title, description, price, condition, category, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(new.seller_id.as_i64())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price.amount())
        .bind(&new.condition)
        .bind(&new.category)
        .bind(&new.image_url)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn delist_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND is_sold = FALSE")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else if self.product_exists(id).await? {
            Err(StoreError::Conflict(id))
        } else {
            Err(StoreError::ProductNotFound(id))
        }
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, product_id, created_at
            FROM cart_entries
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_entry).collect()
    }

    async fn find(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, product_id, created_at
            FROM cart_entries
            WHERE user_id = $1 AND product_id = $2
            "#,
        )
        .bind(user_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart_entry).transpose()
    }

    async fn insert(&self, user_id: UserId, product_id: ProductId) -> Result<CartEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_entries (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT unique_cart_entry DO NOTHING
            RETURNING id, user_id, product_id, created_at
            "#,
        )
        .bind(user_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_cart_entry(row);
        }

        let existing = self.find(user_id, product_id).await?.ok_or_else(|| {
            StoreError::Integrity(format!(
                "cart entry for user {user_id} and product {product_id} vanished during insert"
            ))
        })?;
        Err(StoreError::AlreadyExists {
            user_id,
            product_id,
            existing: existing.id,
        })
    }

    async fn remove(&self, entry_id: CartEntryId, requester: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cart_entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id.as_i64())
            .bind(requester.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cart_entries WHERE id = $1)")
                .bind(entry_id.as_i64())
                .fetch_one(&self.pool)
                .await?;

        if exists {
            Err(StoreError::Forbidden {
                entry_id,
                requester,
            })
        } else {
            Err(StoreError::CartEntryNotFound(entry_id))
        }
    }

    async fn clear(&self, entry_ids: &[CartEntryId]) -> Result<usize> {
        let ids: Vec<i64> = entry_ids.iter().map(CartEntryId::as_i64).collect();
        let result = sqlx::query("DELETE FROM cart_entries WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl OrderLedger for PostgresStore {
    async fn commit_order(&self, new: NewOrder, consumed: &[CartEntryId]) -> Result<Order> {
        let total_amount = new.total_amount();

        // Start a transaction; dropping it without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        for item in &new.items {
            Self::lock_sold_product(&mut tx, item.product_id).await?;
        }

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, total_amount, shipping_address, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(new.user_id.as_i64())
        .bind(total_amount.amount())
        .bind(&new.shipping_address)
        .bind(new.created_at)
        .fetch_one(&mut *tx)
        .await?;
        let order_id = OrderId::new(order_id);

        let mut items = Vec::with_capacity(new.items.len());
        for line in new.items {
            let item_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_items (order_id, product_id, price_at_sale, title_at_sale)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(order_id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(line.price_at_sale.amount())
            .bind(&line.title_at_sale)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_order_item_product")
                {
                    return StoreError::Integrity(format!(
                        "product {} already has an order line",
                        line.product_id
                    ));
                }
                StoreError::Database(e)
            })?;

            items.push(OrderItem {
                id: OrderItemId::new(item_id),
                order_id,
                product_id: line.product_id,
                price_at_sale: line.price_at_sale,
                title_at_sale: line.title_at_sale,
            });
        }

        let ids: Vec<i64> = consumed.iter().map(CartEntryId::as_i64).collect();
        let deleted: Vec<i64> = sqlx::query_scalar(
            "DELETE FROM cart_entries WHERE id = ANY($1) AND user_id = $2 RETURNING id",
        )
        .bind(&ids)
        .bind(new.user_id.as_i64())
        .fetch_all(&mut *tx)
        .await?;
        if deleted.len() != ids.len() {
            // Dropping the transaction rolls back the order and its lines.
            let gone: Vec<CartEntryId> = consumed
                .iter()
                .filter(|id| !deleted.contains(&id.as_i64()))
                .copied()
                .collect();
            tracing::debug!(?gone, "consumed cart entries vanished before commit");
            return Err(StoreError::CartChanged(gone));
        }

        tx.commit().await?;
        tracing::debug!(%order_id, lines = items.len(), "order committed");

        Ok(Order {
            id: order_id,
            user_id: new.user_id,
            total_amount,
            shipping_address: new.shipping_address,
            created_at: new.created_at,
            items,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_amount, shipping_address, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.attach_items(rows).await?.into_iter().next())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_amount, shipping_address, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }

    async fn order_item_for_product(&self, product_id: ProductId) -> Result<Option<OrderItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, product_id, price_at_sale, title_at_sale
            FROM order_items
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order_item).transpose()
    }
}
