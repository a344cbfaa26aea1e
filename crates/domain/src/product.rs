//! Product stock records.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// Available units of a catalog product.
///
/// `quantity` never goes below zero: stores only apply a decrement when the
/// current quantity covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

impl ProductStock {
    /// Creates a new stock record.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, quantity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            quantity,
        }
    }

    /// Returns true if `amount` units can be taken from this record.
    pub fn can_cover(&self, amount: u32) -> bool {
        self.quantity >= amount
    }
}
