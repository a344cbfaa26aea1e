//! Persistence collaborators of the order workflow.
//!
//! Two traits describe what order placement needs from storage:
//! - [`StockStore`]: atomic conditional decrement and unconditional increment
//!   of product quantities
//! - [`OrderRepository`]: insertion with order-ID uniqueness, plus lookups
//!
//! [`InMemoryStore`] backs tests and local runs; [`PostgresStore`] is the
//! production backend.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{OrderRepository, StockStore};
