//! Shared application state.

use std::sync::Arc;

use inventory_store::{OrderRepository, StockStore};
use reservation::{OrderService, ReservationEngine};

use crate::config::{AuthConfig, Config};

/// A backend that holds both product stock and orders.
pub trait Store: StockStore + OrderRepository + Clone + 'static {
    /// Short backend name reported by `/health`.
    fn backend(&self) -> &'static str;
}

impl Store for inventory_store::InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl Store for inventory_store::PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub engine: ReservationEngine<S, S>,
    pub order_service: OrderService<S>,
    pub store: S,
    pub auth: AuthConfig,
}

impl<S: Store> AppState<S> {
    /// Wires the reservation engine and order service over one store.
    pub fn new(store: S, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            engine: ReservationEngine::with_config(
                store.clone(),
                store.clone(),
                config.reservation.clone(),
            ),
            order_service: OrderService::new(store.clone()),
            store,
            auth: config.auth.clone(),
        })
    }
}
