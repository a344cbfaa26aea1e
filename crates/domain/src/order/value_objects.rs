//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02} €", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02} €", self.units(), self.cents_part())
        }
    }
}


/// One product line of an order: what was asked for, and at which price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product being ordered.
    pub product_id: ProductId,

    /// Display name, used in customer-facing messages.
    pub name: String,

    /// Units requested.
    pub quantity: u32,

    /// Price per unit captured when the order was placed.
    pub unit_price: Money,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns quantity * unit_price, or `None` if it does not fit.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// Delivery address of an order. All three fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl ShippingAddress {
    /// Creates a new shipping address.
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Returns true when no field is blank.
    pub fn is_complete(&self) -> bool {
        [&self.street, &self.city, &self.postal_code]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}
