//! The persisted order record.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

use super::{LineItem, Money, OrderStatus, ShippingAddress};

/// An order whose line items have all been reserved.
///
/// Orders are only ever built after stock reservation succeeded, so a stored
/// `Order` never refers to partially reserved stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total: Money,
    pub item_count: u32,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Moves the order to `next`, rejecting transitions the state machine forbids.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns true if the order belongs to `user_id`.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
