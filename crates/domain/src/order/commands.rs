//! Order commands.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};

use crate::error::OrderError;

use super::{LineItem, Money, Order, OrderStatus, ShippingAddress};

/// Command to place a new order.
///
/// Totals are declared by the client and stored as given; `computed_total`
/// and `computed_item_count` exist so callers can detect a mismatch.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Client-supplied order ID, unique per order.
    pub order_id: OrderId,

    /// Authenticated principal, if any.
    pub user_id: Option<UserId>,

    /// Line items, reserved in this order.
    pub items: Vec<LineItem>,

    pub shipping_address: ShippingAddress,

    pub payment_method: String,

    pub declared_total: Money,

    pub declared_item_count: u32,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(
        order_id: impl Into<OrderId>,
        user_id: Option<UserId>,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_method: impl Into<String>,
    ) -> Self {
        let mut cmd = Self {
            order_id: order_id.into(),
            user_id,
            items,
            shipping_address,
            payment_method: payment_method.into(),
            declared_total: Money::zero(),
            declared_item_count: 0,
        };
        // Out-of-range totals are left at zero; `validate` rejects them.
        cmd.declared_total = cmd.computed_total().unwrap_or_default();
        cmd.declared_item_count = cmd.computed_item_count().unwrap_or_default();
        cmd
    }

    /// Overrides the declared total and item count.
    pub fn with_declared_totals(mut self, total: Money, item_count: u32) -> Self {
        self.declared_total = total;
        self.declared_item_count = item_count;
        self
    }

    /// Checks the preconditions that must hold before any stock is touched.
    ///
    /// Checks run in a fixed order: items, address, principal, quantities,
    /// then whether the total and unit count fit their types.
    /// Returns the authenticated user on success.
    pub fn validate(&self) -> Result<UserId, OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if !self.shipping_address.is_complete() {
            return Err(OrderError::IncompleteAddress);
        }
        let user_id = self.user_id.ok_or(OrderError::Unauthenticated)?;
        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                name: item.name.clone(),
            });
        }
        if self.computed_total().is_none() || self.computed_item_count().is_none() {
            return Err(OrderError::TotalOutOfRange);
        }
        Ok(user_id)
    }

    /// Sum of quantity * unit price over all line items.
    ///
    /// `None` if the amount overflows.
    pub fn computed_total(&self) -> Option<Money> {
        self.items.iter().try_fold(Money::zero(), |total, item| {
            total.checked_add(item.total_price()?)
        })
    }

    /// Sum of quantities over all line items.
    ///
    /// `None` if the count overflows.
    pub fn computed_item_count(&self) -> Option<u32> {
        self.items
            .iter()
            .try_fold(0u32, |count, item| count.checked_add(item.quantity))
    }

    /// Builds the `Pending` order record for a fully reserved command.
    pub fn into_order(self, user_id: UserId, created_at: DateTime<Utc>) -> Order {
        Order {
            id: self.order_id,
            user_id,
            items: self.items,
            total: self.declared_total,
            item_count: self.declared_item_count,
            shipping_address: self.shipping_address,
            payment_method: self.payment_method,
            status: OrderStatus::Pending,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;

    fn address() -> ShippingAddress {
        ShippingAddress::new("3 quai Saint-Vincent", "Lyon", "69001")
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new(ProductId::new(1), "Pommes", 2, Money::from_cents(300)),
            LineItem::new(ProductId::new(2), "Poires", 1, Money::from_cents(450)),
        ]
    }

    #[test]
    fn test_new_declares_computed_totals() {
        let cmd = PlaceOrder::new("CMD-1", Some(UserId::new()), items(), address(), "card");
        assert_eq!(cmd.declared_total, Money::from_cents(1050));
        assert_eq!(cmd.declared_item_count, 3);
    }

    #[test]
    fn test_validate_returns_user() {
        let user = UserId::new();
        let cmd = PlaceOrder::new("CMD-1", Some(user), items(), address(), "card");
        assert_eq!(cmd.validate(), Ok(user));
    }

    #[test]
    fn test_validate_rejects_empty_items_first() {
        let cmd = PlaceOrder::new("CMD-1", None, vec![], ShippingAddress::default(), "card");
        assert_eq!(cmd.validate(), Err(OrderError::EmptyOrder));
    }

    #[test]
    fn test_validate_rejects_incomplete_address_before_principal() {
        let cmd = PlaceOrder::new("CMD-1", None, items(), ShippingAddress::default(), "card");
        assert_eq!(cmd.validate(), Err(OrderError::IncompleteAddress));
    }

    #[test]
    fn test_validate_rejects_missing_principal() {
        let cmd = PlaceOrder::new("CMD-1", None, items(), address(), "card");
        assert_eq!(cmd.validate(), Err(OrderError::Unauthenticated));
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let mut line_items = items();
        line_items[1].quantity = 0;
        let cmd = PlaceOrder::new("CMD-1", Some(UserId::new()), line_items, address(), "card");
        assert_eq!(
            cmd.validate(),
            Err(OrderError::InvalidQuantity {
                name: "Poires".to_string()
            })
        );
    }

    #[test]
    fn test_validate_rejects_quantities_that_overflow_the_count() {
        let line_items = vec![
            LineItem::new(ProductId::new(1), "Riz", 3_000_000_000, Money::from_cents(1)),
            LineItem::new(ProductId::new(2), "Sel", 3_000_000_000, Money::from_cents(1)),
        ];
        let cmd = PlaceOrder::new("CMD-1", Some(UserId::new()), line_items, address(), "card");

        assert_eq!(cmd.computed_item_count(), None);
        assert_eq!(cmd.declared_item_count, 0);
        assert_eq!(cmd.validate(), Err(OrderError::TotalOutOfRange));
    }

    #[test]
    fn test_validate_rejects_prices_that_overflow_the_total() {
        let line_items = vec![LineItem::new(
            ProductId::new(1),
            "Truffe",
            2,
            Money::from_cents(i64::MAX),
        )];
        let cmd = PlaceOrder::new("CMD-1", Some(UserId::new()), line_items, address(), "card");

        assert_eq!(cmd.computed_total(), None);
        assert_eq!(cmd.validate(), Err(OrderError::TotalOutOfRange));
    }

    #[test]
    fn test_into_order_keeps_declared_values() {
        let user = UserId::new();
        let cmd = PlaceOrder::new("CMD-9", Some(user), items(), address(), "paypal")
            .with_declared_totals(Money::from_cents(999), 7);
        assert_eq!(cmd.computed_total(), Some(Money::from_cents(1050)));
        assert_eq!(cmd.computed_item_count(), Some(3));

        let order = cmd.into_order(user, Utc::now());
        assert_eq!(order.id, OrderId::new("CMD-9"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::from_cents(999));
        assert_eq!(order.item_count, 7);
        assert_eq!(order.payment_method, "paypal");
    }
}
