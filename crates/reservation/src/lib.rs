//! Order placement with all-or-nothing stock reservation.
//!
//! Placing an order runs these steps:
//! 1. Validate the command (items, address, principal, quantities)
//! 2. Reserve stock for each line item, in order, with one atomic
//!    conditional decrement per item
//! 3. Persist the order
//!
//! If a reservation fails, the decrements already applied are undone in
//! reverse order before the error is returned.

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orders;

pub use config::ReservationConfig;
pub use engine::ReservationEngine;
pub use error::{OrderServiceError, PlaceOrderError};
pub use ledger::{LedgerEntry, ReservationLedger};
pub use orders::OrderService;
