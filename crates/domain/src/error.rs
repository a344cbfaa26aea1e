//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by order validation and order status changes.
///
/// The display strings of the validation variants are the messages shown to
/// storefront customers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order contains no line items.
    #[error("Aucun article dans la commande")]
    EmptyOrder,

    /// Street, city or postal code is missing.
    #[error("L'adresse de livraison est incomplète.")]
    IncompleteAddress,

    /// No authenticated user was supplied.
    #[error("Utilisateur non identifié. Connexion requise.")]
    Unauthenticated,

    /// A line item requests zero units.
    #[error("Quantité invalide pour \"{name}\".")]
    InvalidQuantity { name: String },

    /// The order total or unit count does not fit the amount types.
    #[error("Montant de la commande invalide.")]
    TotalOutOfRange,

    /// The requested status change is not allowed.
    #[error("Invalid status transition: cannot go from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
}
