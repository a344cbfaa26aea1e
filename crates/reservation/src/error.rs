//! Order placement and order service error types.

use common::{OrderId, ProductId};
use domain::OrderError;
use inventory_store::StoreError;
use thiserror::Error;

use crate::ledger::LedgerEntry;

/// Errors returned by `ReservationEngine::place_order`.
///
/// Display strings of the customer-facing variants are the messages returned
/// to the storefront.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// The command failed validation; no stock was touched.
    #[error(transparent)]
    Rejected(#[from] OrderError),

    /// A line item could not be reserved. Earlier reservations were undone.
    #[error("Stock insuffisant pour \"{name}\".")]
    InsufficientStock { product_id: ProductId, name: String },

    /// The order ID was already used. Stock reserved by this attempt stays taken.
    #[error("Cette commande a déjà été enregistrée.")]
    DuplicateOrder(OrderId),

    /// Storing the order failed after every item was reserved.
    #[error("Erreur lors de la création de la commande.")]
    OrderPersistence(#[source] StoreError),

    /// The store failed while reserving. Earlier reservations were undone.
    #[error("Store error while reserving stock: {0}")]
    Store(#[source] StoreError),

    /// Some reservations could not be undone after `cause`.
    #[error(
        "Stock compensation incomplete after \"{cause}\": {} reservation(s) left applied",
        .unrestored.len()
    )]
    CompensationIncomplete {
        cause: Box<PlaceOrderError>,
        unrestored: Vec<LedgerEntry>,
    },
}

impl PlaceOrderError {
    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            PlaceOrderError::Rejected(err) => match err {
                OrderError::EmptyOrder => "empty_order",
                OrderError::IncompleteAddress => "incomplete_address",
                OrderError::Unauthenticated => "unauthenticated",
                OrderError::InvalidQuantity { .. } => "invalid_quantity",
                OrderError::TotalOutOfRange => "total_out_of_range",
                OrderError::InvalidStatusTransition { .. } => "invalid_status",
            },
            PlaceOrderError::InsufficientStock { .. } => "insufficient_stock",
            PlaceOrderError::DuplicateOrder(_) => "duplicate_order",
            PlaceOrderError::OrderPersistence(_) => "persistence",
            PlaceOrderError::Store(_) => "store",
            PlaceOrderError::CompensationIncomplete { .. } => "compensation_incomplete",
        }
    }
}

/// Errors returned by `OrderService`.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// No order with this ID exists.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The status change is not allowed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The order status changed while the update was in flight.
    #[error("Order {0} was modified concurrently")]
    Conflict(OrderId),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
