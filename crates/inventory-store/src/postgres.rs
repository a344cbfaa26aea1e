use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{LineItem, Money, Order, OrderStatus, ProductStock, ShippingAddress};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderRepository, StockStore},
};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, quantity";

const ORDER_COLUMNS: &str = "id, user_id, items, total_cents, item_count, street, city, \
                             postal_code, payment_method, status, created_at";

/// PostgreSQL-backed stock and order store.
///
/// Stock mutations are single `UPDATE ... RETURNING` statements, so the
/// availability check and the write happen atomically inside the database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<ProductStock> {
        let quantity: i64 = row.try_get("quantity")?;
        Ok(ProductStock {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity: to_u32(quantity, "quantity")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items_json: serde_json::Value = row.try_get("items")?;
        let items: Vec<LineItem> = serde_json::from_value(items_json)?;
        let status: String = row.try_get("status")?;
        let item_count: i64 = row.try_get("item_count")?;

        Ok(Order {
            id: OrderId::new(row.try_get::<String, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            items,
            total: Money::from_cents(row.try_get("total_cents")?),
            item_count: to_u32(item_count, "item_count")?,
            shipping_address: ShippingAddress {
                street: row.try_get("street")?,
                city: row.try_get("city")?,
                postal_code: row.try_get("postal_code")?,
            },
            payment_method: row.try_get("payment_method")?,
            status: status.parse().map_err(StoreError::InvalidRecord)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{column} out of range: {value}")))
}

#[async_trait]
impl StockStore for PostgresStore {
    #[tracing::instrument(skip(self))]
    async fn conditional_decrement(
        &self,
        product_id: ProductId,
        amount: u32,
    ) -> Result<Option<ProductStock>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(i64::from(amount))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn increment(&self, product_id: ProductId, amount: u32) -> Result<ProductStock> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(i64::from(amount))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductStock>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn upsert_product(&self, product: ProductStock) -> Result<ProductStock> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, price_cents, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.quantity))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let items_json = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, total_cents, item_count, street, city,
                                postal_code, payment_method, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.user_id.as_uuid())
        .bind(items_json)
        .bind(order.total.cents())
        .bind(i64::from(order.item_count))
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.payment_method)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order.id.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(order)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn compare_and_set_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id.as_str())
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }
}
