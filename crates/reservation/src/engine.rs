//! Stock reservation engine for order placement.

use chrono::Utc;
use domain::{LineItem, Order, PlaceOrder};
use inventory_store::{OrderRepository, StockStore, StoreError};

use crate::config::ReservationConfig;
use crate::error::PlaceOrderError;
use crate::ledger::{LedgerEntry, ReservationLedger};

/// A reservation loop that stopped early, with the decrements applied so far.
struct ReservationFailure {
    ledger: ReservationLedger,
    cause: PlaceOrderError,
}

/// Places orders with all-or-nothing stock reservation.
///
/// Each line item is reserved with one atomic conditional decrement, strictly
/// in the order given. The engine takes no locks: the store's per-record
/// atomicity is the only serialization point between concurrent orders.
pub struct ReservationEngine<S, O>
where
    S: StockStore,
    O: OrderRepository,
{
    stock: S,
    orders: O,
    config: ReservationConfig,
}

impl<S, O> ReservationEngine<S, O>
where
    S: StockStore,
    O: OrderRepository,
{
    /// Creates a new engine with default settings.
    pub fn new(stock: S, orders: O) -> Self {
        Self::with_config(stock, orders, ReservationConfig::default())
    }

    /// Creates a new engine with the given settings.
    pub fn with_config(stock: S, orders: O, config: ReservationConfig) -> Self {
        Self {
            stock,
            orders,
            config,
        }
    }

    /// Validates, reserves and persists an order.
    ///
    /// Returns the stored order. On `InsufficientStock` and `Store` errors
    /// every reservation made by this call has been undone; on
    /// `DuplicateOrder` and (by default) `OrderPersistence` they stay applied.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, items = cmd.items.len()))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, PlaceOrderError> {
        let started = std::time::Instant::now();

        let result = self.run(cmd).await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(order_id = %order.id, user_id = %order.user_id, total = %order.total, "order placed");
            }
            Err(err) => {
                metrics::counter!("orders_rejected_total", "reason" => err.reason()).increment(1);
                tracing::warn!(reason = err.reason(), error = %err, "order rejected");
            }
        }

        result
    }

    async fn run(&self, cmd: PlaceOrder) -> Result<Order, PlaceOrderError> {
        // 1. Preconditions, before any stock is touched
        let user_id = cmd.validate()?;

        // Both are in range once validation passed.
        let computed_total = cmd.computed_total().unwrap_or_default();
        let computed_item_count = cmd.computed_item_count().unwrap_or_default();
        if computed_total != cmd.declared_total || computed_item_count != cmd.declared_item_count {
            tracing::warn!(
                declared_total = %cmd.declared_total,
                %computed_total,
                declared_item_count = cmd.declared_item_count,
                computed_item_count,
                "declared totals differ from line items, keeping declared values"
            );
        }

        // 2. Reserve every line item, or undo what was reserved
        let ledger = match self.reserve_all(&cmd.items).await {
            Ok(ledger) => ledger,
            Err(ReservationFailure { ledger, cause }) => {
                return Err(self.compensate(ledger, cause).await);
            }
        };

        // 3. Persist the order
        let order = cmd.into_order(user_id, Utc::now());
        match self.orders.insert_order(order).await {
            Ok(order) => {
                ledger.discard();
                Ok(order)
            }
            Err(StoreError::DuplicateOrder(order_id)) => {
                let kept = ledger.discard();
                tracing::warn!(%order_id, kept, "duplicate order id, reserved stock stays applied");
                Err(PlaceOrderError::DuplicateOrder(order_id))
            }
            Err(err) if self.config.restock_on_persistence_failure => {
                Err(self
                    .compensate(ledger, PlaceOrderError::OrderPersistence(err))
                    .await)
            }
            Err(err) => {
                let kept = ledger.discard();
                tracing::error!(error = %err, kept, "order persistence failed, reserved stock stays applied");
                Err(PlaceOrderError::OrderPersistence(err))
            }
        }
    }

    /// Reserves items one at a time, stopping at the first failure.
    async fn reserve_all(&self, items: &[LineItem]) -> Result<ReservationLedger, ReservationFailure> {
        let mut ledger = ReservationLedger::new();

        for item in items {
            match self
                .stock
                .conditional_decrement(item.product_id, item.quantity)
                .await
            {
                Ok(Some(updated)) => {
                    metrics::counter!("stock_reservations_total").increment(1);
                    tracing::debug!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        remaining = updated.quantity,
                        "stock reserved"
                    );
                    ledger.record(item.product_id, item.quantity);
                }
                Ok(None) => {
                    return Err(ReservationFailure {
                        ledger,
                        cause: PlaceOrderError::InsufficientStock {
                            product_id: item.product_id,
                            name: item.name.clone(),
                        },
                    });
                }
                Err(err) => {
                    return Err(ReservationFailure {
                        ledger,
                        cause: PlaceOrderError::Store(err),
                    });
                }
            }
        }

        Ok(ledger)
    }

    /// Undoes every ledger entry, newest first, and returns the error to report.
    ///
    /// Entries that cannot be restored are reported through
    /// `CompensationIncomplete` instead of `cause`.
    #[tracing::instrument(skip(self, ledger, cause), fields(entries = ledger.len(), reason = cause.reason()))]
    async fn compensate(&self, ledger: ReservationLedger, cause: PlaceOrderError) -> PlaceOrderError {
        let mut unrestored = Vec::new();

        for entry in ledger.into_compensation_order() {
            if let Err(err) = self.restore(entry).await {
                metrics::counter!("stock_compensation_failures_total").increment(1);
                tracing::error!(
                    product_id = %entry.product_id,
                    quantity = entry.quantity,
                    error = %err,
                    "failed to restore reserved stock"
                );
                unrestored.push(entry);
            }
        }

        if unrestored.is_empty() {
            cause
        } else {
            PlaceOrderError::CompensationIncomplete {
                cause: Box::new(cause),
                unrestored,
            }
        }
    }

    /// Re-increments one entry, retrying with a fixed backoff.
    ///
    /// An increment is not idempotent, so only failures known to have left
    /// the record untouched are retried. Anything else is reported as
    /// unrestored rather than risk restoring the entry twice.
    async fn restore(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.stock.increment(entry.product_id, entry.quantity).await {
                Ok(_) => {
                    metrics::counter!("stock_compensations_total").increment(1);
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.config.compensation_retries => {
                    attempt += 1;
                    tracing::warn!(
                        product_id = %entry.product_id,
                        attempt,
                        error = %err,
                        "compensating increment failed, retrying"
                    );
                    tokio::time::sleep(self.config.compensation_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::{ProductId, UserId};
    use domain::{Money, OrderError, OrderStatus, ProductStock, ShippingAddress};
    use inventory_store::InMemoryStore;
    use inventory_store::memory::StockMutation;

    const A: ProductId = ProductId::new(1);
    const B: ProductId = ProductId::new(2);
    const C: ProductId = ProductId::new(3);

    async fn setup(stock: &[(ProductId, u32)]) -> (ReservationEngine<InMemoryStore, InMemoryStore>, InMemoryStore) {
        setup_with_config(stock, fast_config()).await
    }

    async fn setup_with_config(
        stock: &[(ProductId, u32)],
        config: ReservationConfig,
    ) -> (ReservationEngine<InMemoryStore, InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::with_products(stock.iter().map(|&(id, quantity)| {
            ProductStock::new(id, format!("Produit {id}"), Money::from_cents(100), quantity)
        }))
        .await;
        store.record_mutations().await;
        let engine = ReservationEngine::with_config(store.clone(), store.clone(), config);
        (engine, store)
    }

    fn fast_config() -> ReservationConfig {
        ReservationConfig {
            compensation_retries: 2,
            compensation_backoff: Duration::ZERO,
            restock_on_persistence_failure: false,
        }
    }

    fn item(id: ProductId, name: &str, quantity: u32) -> LineItem {
        LineItem::new(id, name, quantity, Money::from_cents(100))
    }

    fn command(order_id: &str, items: Vec<LineItem>) -> PlaceOrder {
        PlaceOrder::new(
            order_id,
            Some(UserId::new()),
            items,
            ShippingAddress::new("10 rue de la République", "Lyon", "69001"),
            "card",
        )
    }

    #[tokio::test]
    async fn test_success_reserves_every_item_and_persists() {
        let (engine, store) = setup(&[(A, 5), (B, 3)]).await;

        let order = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2), item(B, "B", 1)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.item_count, 3);
        assert_eq!(order.total, Money::from_cents(300));
        assert_eq!(store.quantity_of(A).await, Some(3));
        assert_eq!(store.quantity_of(B).await, Some(2));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_compensates_earlier_items() {
        let (engine, store) = setup(&[(A, 5), (B, 3)]).await;

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2), item(B, "B", 10)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::InsufficientStock { ref name, .. } if name == "B"));
        assert_eq!(store.quantity_of(A).await, Some(5));
        assert_eq!(store.quantity_of(B).await, Some(3));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_is_insufficient_stock() {
        let (engine, store) = setup(&[(A, 5)]).await;

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 1), item(C, "Inconnu", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::InsufficientStock { product_id, .. } if product_id == C));
        assert_eq!(store.quantity_of(A).await, Some(5));
    }

    #[tokio::test]
    async fn test_items_after_failure_are_never_reserved() {
        let (engine, store) = setup(&[(A, 5), (B, 0), (C, 5)]).await;

        engine
            .place_order(command(
                "CMD-1",
                vec![item(A, "A", 1), item(B, "B", 1), item(C, "C", 1)],
            ))
            .await
            .unwrap_err();

        assert_eq!(
            store.mutations().await,
            vec![
                StockMutation::Decrement {
                    product_id: A,
                    amount: 1
                },
                StockMutation::Increment {
                    product_id: A,
                    amount: 1
                },
            ]
        );
        assert_eq!(store.quantity_of(C).await, Some(5));
    }

    #[tokio::test]
    async fn test_compensation_runs_in_reverse_order_once_per_entry() {
        let (engine, store) = setup(&[(A, 5), (B, 5), (C, 0)]).await;

        engine
            .place_order(command(
                "CMD-1",
                vec![item(A, "A", 1), item(B, "B", 2), item(C, "C", 1)],
            ))
            .await
            .unwrap_err();

        let increments: Vec<_> = store
            .mutations()
            .await
            .into_iter()
            .filter_map(|m| match m {
                StockMutation::Increment { product_id, amount } => Some((product_id, amount)),
                StockMutation::Decrement { .. } => None,
            })
            .collect();
        assert_eq!(increments, vec![(B, 2), (A, 1)]);
    }

    #[tokio::test]
    async fn test_precondition_failures_touch_no_stock() {
        let (engine, store) = setup(&[(A, 5)]).await;

        let empty = engine.place_order(command("CMD-1", vec![])).await.unwrap_err();
        assert!(matches!(empty, PlaceOrderError::Rejected(OrderError::EmptyOrder)));

        let mut no_address = command("CMD-2", vec![item(A, "A", 1)]);
        no_address.shipping_address.city = String::new();
        let err = engine.place_order(no_address).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::Rejected(OrderError::IncompleteAddress)));

        let mut anonymous = command("CMD-3", vec![item(A, "A", 1)]);
        anonymous.user_id = None;
        let err = engine.place_order(anonymous).await.unwrap_err();
        assert!(matches!(err, PlaceOrderError::Rejected(OrderError::Unauthenticated)));

        let err = engine
            .place_order(command("CMD-4", vec![item(A, "A", 1), item(A, "Zéro", 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::Rejected(OrderError::InvalidQuantity { .. })));

        assert_eq!(store.quantity_of(A).await, Some(5));
        assert!(store.mutations().await.is_empty());
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_totals_are_rejected_before_reserving() {
        let (engine, store) = setup(&[(A, 5), (B, 5)]).await;

        let err = engine
            .place_order(command(
                "CMD-1",
                vec![item(A, "A", 3_000_000_000), item(B, "B", 3_000_000_000)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::Rejected(OrderError::TotalOutOfRange)));
        assert_eq!(err.reason(), "total_out_of_range");
        assert!(store.mutations().await.is_empty());
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_order_keeps_second_reservation() {
        let (engine, store) = setup(&[(A, 5)]).await;

        engine
            .place_order(command("CMD-1", vec![item(A, "A", 2)]))
            .await
            .unwrap();
        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::DuplicateOrder(ref id) if id.as_str() == "CMD-1"));
        assert_eq!(store.quantity_of(A).await, Some(1));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_stock_by_default() {
        let (engine, store) = setup(&[(A, 5)]).await;
        store.set_fail_on_insert(true).await;

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::OrderPersistence(_)));
        assert_eq!(
            err.to_string(),
            "Erreur lors de la création de la commande."
        );
        assert_eq!(store.quantity_of(A).await, Some(3));
    }

    #[tokio::test]
    async fn test_persistence_failure_restocks_when_enabled() {
        let config = ReservationConfig {
            restock_on_persistence_failure: true,
            ..fast_config()
        };
        let (engine, store) = setup_with_config(&[(A, 5), (B, 5)], config).await;
        store.set_fail_on_insert(true).await;

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2), item(B, "B", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::OrderPersistence(_)));
        assert_eq!(store.quantity_of(A).await, Some(5));
        assert_eq!(store.quantity_of(B).await, Some(5));
    }

    #[tokio::test]
    async fn test_store_error_mid_loop_compensates_then_propagates() {
        let (engine, store) = setup(&[(A, 5), (B, 5)]).await;
        store.set_fail_on_decrement(B, true).await;

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 3), item(B, "B", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::Store(StoreError::Unavailable(_))));
        assert_eq!(store.quantity_of(A).await, Some(5));
        assert_eq!(store.quantity_of(B).await, Some(5));
    }

    #[tokio::test]
    async fn test_compensation_retries_transient_failures() {
        let (engine, store) = setup(&[(A, 5), (B, 0)]).await;
        store.set_failing_increments(2).await;

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2), item(B, "B", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaceOrderError::InsufficientStock { .. }));
        assert_eq!(store.quantity_of(A).await, Some(5));
    }

    /// Applies increments but reports them as failed, as when the reply is
    /// lost after the write committed.
    struct LostReplyStore {
        inner: InMemoryStore,
    }

    #[async_trait::async_trait]
    impl StockStore for LostReplyStore {
        async fn conditional_decrement(
            &self,
            product_id: ProductId,
            amount: u32,
        ) -> inventory_store::Result<Option<ProductStock>> {
            self.inner.conditional_decrement(product_id, amount).await
        }

        async fn increment(
            &self,
            product_id: ProductId,
            amount: u32,
        ) -> inventory_store::Result<ProductStock> {
            self.inner.increment(product_id, amount).await?;
            Err(StoreError::InvalidRecord(
                "connection reset before reply".to_string(),
            ))
        }

        async fn get_product(
            &self,
            product_id: ProductId,
        ) -> inventory_store::Result<Option<ProductStock>> {
            self.inner.get_product(product_id).await
        }

        async fn upsert_product(
            &self,
            product: ProductStock,
        ) -> inventory_store::Result<ProductStock> {
            self.inner.upsert_product(product).await
        }
    }

    #[tokio::test]
    async fn test_increment_with_unknown_outcome_is_not_resent() {
        let (_, store) = setup(&[(A, 5), (B, 0)]).await;
        let engine = ReservationEngine::with_config(
            LostReplyStore {
                inner: store.clone(),
            },
            store.clone(),
            fast_config(),
        );

        let err = engine
            .place_order(command("CMD-1", vec![item(A, "A", 2), item(B, "B", 1)]))
            .await
            .unwrap_err();

        match err {
            PlaceOrderError::CompensationIncomplete { unrestored, .. } => {
                assert_eq!(
                    unrestored,
                    vec![LedgerEntry {
                        product_id: A,
                        quantity: 2
                    }]
                );
            }
            other => panic!("expected CompensationIncomplete, got {other:?}"),
        }
        // Restored once, never over-restocked.
        assert_eq!(store.quantity_of(A).await, Some(5));
        let increments = store
            .mutations()
            .await
            .into_iter()
            .filter(|m| matches!(m, StockMutation::Increment { .. }))
            .count();
        assert_eq!(increments, 1);
    }

    #[tokio::test]
    async fn test_compensation_failure_is_reported_with_unrestored_entries() {
        let (engine, store) = setup(&[(A, 5), (B, 5), (C, 0)]).await;
        store.set_failing_increments(100).await;

        let err = engine
            .place_order(command(
                "CMD-1",
                vec![item(A, "A", 2), item(B, "B", 1), item(C, "C", 1)],
            ))
            .await
            .unwrap_err();

        let (cause, unrestored) = match err {
            PlaceOrderError::CompensationIncomplete { cause, unrestored } => (cause, unrestored),
            other => panic!("expected CompensationIncomplete, got {other:?}"),
        };
        assert!(matches!(*cause, PlaceOrderError::InsufficientStock { product_id, .. } if product_id == C));
        assert_eq!(
            unrestored,
            vec![
                LedgerEntry {
                    product_id: B,
                    quantity: 1
                },
                LedgerEntry {
                    product_id: A,
                    quantity: 2
                },
            ]
        );
        assert_eq!(store.quantity_of(A).await, Some(3));
        assert_eq!(store.quantity_of(B).await, Some(4));
    }

    #[tokio::test]
    async fn test_declared_totals_are_stored_as_given() {
        let (engine, _) = setup(&[(A, 5)]).await;

        let order = engine
            .place_order(
                command("CMD-1", vec![item(A, "A", 2)])
                    .with_declared_totals(Money::from_cents(150), 2),
            )
            .await
            .unwrap();

        assert_eq!(order.total, Money::from_cents(150));
        assert_eq!(order.item_count, 2);
    }
}
