//! Order lookups and status changes.

use common::{OrderId, UserId};
use domain::{Order, OrderStatus};
use inventory_store::{OrderRepository, StoreError};

use crate::error::OrderServiceError;

/// Service for reading orders and moving them through their status lifecycle.
///
/// Status changes never touch stock.
pub struct OrderService<O: OrderRepository> {
    orders: O,
}

impl<O: OrderRepository> OrderService<O> {
    /// Creates a new order service over the given repository.
    pub fn new(orders: O) -> Self {
        Self { orders }
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.orders.get_order(order_id).await
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        self.orders.list_orders_for_user(user_id).await
    }

    /// Moves an order to `next` if the status state machine allows it.
    ///
    /// The write only succeeds if the status is still the one that was
    /// validated; otherwise `Conflict` is returned.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        next: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        let mut order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderServiceError::NotFound(order_id.clone()))?;

        let current = order.status;
        order.transition_to(next)?;

        let updated = self
            .orders
            .compare_and_set_status(order_id, current, next)
            .await?
            .ok_or_else(|| OrderServiceError::Conflict(order_id.clone()))?;

        metrics::counter!("order_status_changes_total", "status" => next.as_str()).increment(1);
        tracing::info!(%order_id, from = %current, to = %next, "order status changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::ProductId;
    use domain::{LineItem, Money, OrderError, ShippingAddress};
    use inventory_store::InMemoryStore;

    async fn setup() -> (OrderService<InMemoryStore>, OrderId, UserId) {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let order = Order {
            id: OrderId::new("CMD-1"),
            user_id,
            items: vec![LineItem::new(
                ProductId::new(1),
                "Lentilles",
                1,
                Money::from_cents(320),
            )],
            total: Money::from_cents(320),
            item_count: 1,
            shipping_address: ShippingAddress::new("2 rue Victor Hugo", "Lyon", "69002"),
            payment_method: "card".to_string(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        store.insert_order(order).await.unwrap();
        (OrderService::new(store), OrderId::new("CMD-1"), user_id)
    }

    #[tokio::test]
    async fn test_update_status_follows_lifecycle() {
        let (service, id, _) = setup().await;

        let shipped = service.update_status(&id, OrderStatus::Shipped).await.unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        let delivered = service
            .update_status(&id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let (service, id, _) = setup().await;

        let result = service.update_status(&id, OrderStatus::Delivered).await;

        assert!(matches!(
            result,
            Err(OrderServiceError::Order(OrderError::InvalidStatusTransition { .. }))
        ));
        let order = service.get_order(&id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_unknown_order() {
        let (service, _, _) = setup().await;

        let result = service
            .update_status(&OrderId::new("CMD-404"), OrderStatus::Shipped)
            .await;

        assert!(matches!(result, Err(OrderServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let (service, _, user_id) = setup().await;

        assert_eq!(service.list_for_user(user_id).await.unwrap().len(), 1);
        assert!(service.list_for_user(UserId::new()).await.unwrap().is_empty());
    }
}
