//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of a persisted order.
///
/// State transitions:
/// ```text
/// Pending ──► Shipped ──► Delivered
///    │           │
///    └───────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Stock is reserved and the order is awaiting shipment.
    #[default]
    Pending,

    /// Handed over to the carrier.
    Shipped,

    /// Received by the customer (terminal state).
    Delivered,

    /// Cancelled before delivery (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if an order in this status may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Cancelled)
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
