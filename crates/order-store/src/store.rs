use async_trait::async_trait;

use crate::{Money, Order, OrderId, OrderItem, OrderWithItems, Result, UserId};

/// A single atomic unit of work against the order store.
///
/// Nothing written through a transaction is visible to readers until
/// [`commit`](OrderTransaction::commit) succeeds. Dropping a transaction
/// without committing discards every write.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Stages a new order row.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Stages a new order item row.
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;

    /// Sets the total of an order inserted in this transaction.
    async fn update_order_total(&mut self, order_id: OrderId, total: Money) -> Result<()>;

    /// Makes all staged writes visible at once.
    async fn commit(self) -> Result<()>;

    /// Discards all staged writes.
    async fn rollback(self) -> Result<()>;
}

/// Durable repository for orders and their items.
///
/// Implementations must be thread-safe; reads observe the last committed state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    type Transaction: OrderTransaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Loads an order together with its items.
    ///
    /// Returns None if the order doesn't exist.
    async fn load_order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>>;

    /// Loads every order owned by a user, oldest first.
    async fn load_orders_by_user(&self, user_id: &UserId) -> Result<Vec<OrderWithItems>>;

    /// Finds the order created by a user under an idempotency key.
    async fn find_order_by_idempotency_key(
        &self,
        user_id: &UserId,
        key: &str,
    ) -> Result<Option<OrderId>>;
}
