//! Per-attempt record of applied stock decrements.

use common::ProductId;

/// One successful reservation: `quantity` units taken from `product_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Ordered list of the decrements applied during one placement attempt.
///
/// The ledger is neither `Clone` nor reusable: both ways of ending an attempt
/// (`into_compensation_order` and `discard`) consume it, so an entry can be
/// compensated at most once.
#[derive(Debug, Default)]
pub struct ReservationLedger {
    entries: Vec<LedgerEntry>,
}

impl ReservationLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decrement that the store has applied.
    pub fn record(&mut self, product_id: ProductId, quantity: u32) {
        self.entries.push(LedgerEntry {
            product_id,
            quantity,
        });
    }

    /// Returns the recorded entries, oldest first.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the ledger, yielding entries newest first for compensation.
    pub fn into_compensation_order(self) -> impl Iterator<Item = LedgerEntry> {
        self.entries.into_iter().rev()
    }

    /// Ends the attempt without compensating. Returns the number of entries dropped.
    pub fn discard(self) -> usize {
        self.entries.len()
    }
}
