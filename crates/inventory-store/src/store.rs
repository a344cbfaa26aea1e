use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderStatus, ProductStock};

use crate::Result;

/// Product quantities, mutated one record at a time.
///
/// Every mutation is a single atomic step at the store level. Callers never
/// read a quantity and write it back separately.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Removes `amount` units from the product if at least `amount` are available.
    ///
    /// Returns the updated record, or `None` when the predicate did not match
    /// (unknown product or not enough stock). Nothing is changed in that case.
    async fn conditional_decrement(
        &self,
        product_id: ProductId,
        amount: u32,
    ) -> Result<Option<ProductStock>>;

    /// Adds `amount` units back to the product unconditionally.
    ///
    /// Only used to undo an earlier decrement.
    async fn increment(&self, product_id: ProductId, amount: u32) -> Result<ProductStock>;

    /// Loads a stock record.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductStock>>;

    /// Creates or replaces a stock record.
    async fn upsert_product(&self, product: ProductStock) -> Result<ProductStock>;
}

/// Persisted orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a new order.
    ///
    /// Fails with `StoreError::DuplicateOrder` if the order ID is taken.
    async fn insert_order(&self, order: Order) -> Result<Order>;

    /// Loads an order by ID.
    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Sets the status to `next` only if it is currently `expected`.
    ///
    /// Returns `None` when the order is missing or its status has changed.
    async fn compare_and_set_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>>;
}
