use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the stock or order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with the same ID has already been stored.
    #[error("Duplicate order: {0}")]
    DuplicateOrder(OrderId),

    /// The product record does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The store could not be reached. Nothing was written.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to a domain record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the failed operation is known not to have been applied.
    ///
    /// Only these errors are safe to resend for writes that are not
    /// idempotent. A lost reply after a commit is not among them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Database(sqlx::Error::PoolTimedOut)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
