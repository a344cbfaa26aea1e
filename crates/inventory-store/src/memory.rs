use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderStatus, ProductStock};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{OrderRepository, StockStore},
};

/// A stock mutation applied by the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMutation {
    Decrement { product_id: ProductId, amount: u32 },
    Increment { product_id: ProductId, amount: u32 },
}

#[derive(Debug, Default)]
struct InMemoryState {
    products: HashMap<ProductId, ProductStock>,
    orders: HashMap<OrderId, Order>,
    /// Insertion order, used for newest-first listings.
    order_sequence: Vec<OrderId>,
    /// Only kept once `record_mutations` was called.
    mutations: Option<Vec<StockMutation>>,
    fail_decrement_for: HashSet<ProductId>,
    failing_increments: u32,
    fail_on_insert: bool,
}

/// In-memory stock and order store.
///
/// Each mutation runs under a single write guard, which gives the same
/// per-record atomicity as the database backend. The `set_fail_*` hooks
/// inject store outages for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given stock records.
    pub async fn with_products(products: impl IntoIterator<Item = ProductStock>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for product in products {
                state.products.insert(product.id, product);
            }
        }
        store
    }

    /// Returns the current quantity of a product.
    pub async fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.quantity)
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Starts logging stock mutations. The log is off by default.
    pub async fn record_mutations(&self) {
        self.state.write().await.mutations.get_or_insert_with(Vec::new);
    }

    /// Returns the stock mutations logged so far, oldest first.
    pub async fn mutations(&self) -> Vec<StockMutation> {
        self.state
            .read()
            .await
            .mutations
            .clone()
            .unwrap_or_default()
    }

    /// Makes decrements of `product_id` fail with `StoreError::Unavailable`.
    pub async fn set_fail_on_decrement(&self, product_id: ProductId, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.fail_decrement_for.insert(product_id);
        } else {
            state.fail_decrement_for.remove(&product_id);
        }
    }

    /// Makes the next `count` increments fail with `StoreError::Unavailable`.
    pub async fn set_failing_increments(&self, count: u32) {
        self.state.write().await.failing_increments = count;
    }

    /// Makes order insertion fail with `StoreError::Unavailable`.
    pub async fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().await.fail_on_insert = fail;
    }
}

#[async_trait]
impl StockStore for InMemoryStore {
    async fn conditional_decrement(
        &self,
        product_id: ProductId,
        amount: u32,
    ) -> Result<Option<ProductStock>> {
        let mut state = self.state.write().await;

        if state.fail_decrement_for.contains(&product_id) {
            return Err(StoreError::Unavailable(format!(
                "decrement of product {product_id} failed"
            )));
        }

        let Some(product) = state.products.get_mut(&product_id) else {
            return Ok(None);
        };
        if !product.can_cover(amount) {
            return Ok(None);
        }
        product.quantity -= amount;
        let updated = product.clone();

        if let Some(log) = state.mutations.as_mut() {
            log.push(StockMutation::Decrement { product_id, amount });
        }
        Ok(Some(updated))
    }

    async fn increment(&self, product_id: ProductId, amount: u32) -> Result<ProductStock> {
        let mut state = self.state.write().await;

        if state.failing_increments > 0 {
            state.failing_increments -= 1;
            return Err(StoreError::Unavailable(format!(
                "increment of product {product_id} failed"
            )));
        }

        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.quantity = product
            .quantity
            .checked_add(amount)
            .ok_or_else(|| StoreError::InvalidRecord(format!("quantity overflow on {product_id}")))?;
        let updated = product.clone();

        if let Some(log) = state.mutations.as_mut() {
            log.push(StockMutation::Increment { product_id, amount });
        }
        Ok(updated)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductStock>> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn upsert_product(&self, product: ProductStock) -> Result<ProductStock> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product.clone());
        Ok(product)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.fail_on_insert {
            return Err(StoreError::Unavailable(format!(
                "insert of order {} failed",
                order.id
            )));
        }
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }

        state.order_sequence.push(order.id.clone());
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(order_id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let orders = state
            .order_sequence
            .iter()
            .rev()
            .filter_map(|id| state.orders.get(id))
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        Ok(orders)
    }

    async fn compare_and_set_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(order_id) {
            Some(order) if order.status == expected => {
                order.status = next;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}
