use thiserror::Error;

use crate::{OrderId, UserId};

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another order already holds this idempotency key for the user.
    #[error("Idempotency key '{key}' already used by user {user_id}")]
    DuplicateIdempotencyKey { user_id: UserId, key: String },

    /// A total update referenced an order not inserted in the same transaction.
    #[error("Order {0} was not inserted in this transaction")]
    OrderNotStaged(OrderId),

    /// A stored row could not be mapped back into the domain model.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The transaction could not be committed.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
