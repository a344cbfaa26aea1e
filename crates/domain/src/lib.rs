//! Domain layer for the storefront order service.
//!
//! This crate provides the core domain types:
//! - Value objects for money, line items and shipping addresses
//! - Product stock records mutated by order placement
//! - The persisted order record and its status state machine
//! - The `PlaceOrder` command with its precondition checks

pub mod error;
pub mod order;
pub mod product;

pub use common::{OrderId, ProductId, UserId};
pub use error::OrderError;
pub use order::{LineItem, Money, Order, OrderStatus, PlaceOrder, ShippingAddress};
pub use product::ProductStock;
