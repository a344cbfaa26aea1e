//! Order record and related types.

mod commands;
mod record;
mod state;
mod value_objects;

pub use commands::PlaceOrder;
pub use record::Order;
pub use state::OrderStatus;
pub use value_objects::{LineItem, Money, ShippingAddress};
