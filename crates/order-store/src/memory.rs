use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as KeyLock, OwnedMutexGuard, RwLock};

use crate::{
    Money, Order, OrderId, OrderItem, OrderWithItems, Result, StoreError, UserId,
    store::{OrderStore, OrderTransaction},
};

#[derive(Debug, Default)]
struct InMemoryState {
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
    /// Order IDs in commit order.
    sequence: Vec<OrderId>,
}

impl InMemoryState {
    fn load(&self, order_id: OrderId) -> Option<OrderWithItems> {
        self.orders.get(&order_id).map(|order| OrderWithItems {
            order: order.clone(),
            items: self.items.get(&order_id).cloned().unwrap_or_default(),
        })
    }

    fn key_taken(&self, user_id: &UserId, key: &str) -> bool {
        self.orders
            .values()
            .any(|o| &o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
    }
}

/// Per `(user, idempotency key)` locks held by open transactions.
type KeyClaims = Arc<Mutex<HashMap<(UserId, String), Arc<KeyLock<()>>>>>;

/// In-memory order store implementation for testing.
///
/// Provides the same transactional semantics as the PostgreSQL store:
/// writes are staged in the transaction and applied under a single
/// write lock on commit. Inserting an order with an idempotency key waits
/// for any other open transaction holding the same key, then fails with
/// [`StoreError::DuplicateIdempotencyKey`] if that transaction committed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
    claims: KeyClaims,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent commit to fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of committed order items.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.values().map(Vec::len).sum()
    }
}

/// Transaction handle for [`InMemoryOrderStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<InMemoryState>>,
    claims: KeyClaims,
    fail_on_commit: bool,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    /// Released when the transaction commits, rolls back or is dropped.
    held_keys: Vec<OwnedMutexGuard<()>>,
}

impl InMemoryTransaction {
    async fn claim_key(&mut self, user_id: &UserId, key: &str) -> Result<()> {
        let duplicate = || StoreError::DuplicateIdempotencyKey {
            user_id: user_id.clone(),
            key: key.to_string(),
        };

        let staged_twice = self
            .orders
            .iter()
            .any(|o| &o.user_id == user_id && o.idempotency_key.as_deref() == Some(key));
        if staged_twice {
            return Err(duplicate());
        }

        let lock = {
            let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                claims
                    .entry((user_id.clone(), key.to_string()))
                    .or_default(),
            )
        };
        let guard = lock.lock_owned().await;

        if self.state.read().await.key_taken(user_id, key) {
            return Err(duplicate());
        }
        self.held_keys.push(guard);
        Ok(())
    }
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if let Some(key) = order.idempotency_key.as_deref() {
            self.claim_key(&order.user_id, key).await?;
        }
        self.orders.push(order.clone());
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        self.items.push(item.clone());
        Ok(())
    }

    async fn update_order_total(&mut self, order_id: OrderId, total: Money) -> Result<()> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::OrderNotStaged(order_id))?;
        order.total = total;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if self.fail_on_commit {
            return Err(StoreError::CommitFailed(
                "commit rejected by in-memory store".to_string(),
            ));
        }

        let mut state = self.state.write().await;

        // Unique (user_id, idempotency_key), checked before anything is applied
        for (i, order) in self.orders.iter().enumerate() {
            if let Some(key) = order.idempotency_key.as_deref() {
                let staged_twice = self.orders[..i].iter().any(|o| {
                    o.user_id == order.user_id && o.idempotency_key.as_deref() == Some(key)
                });
                if staged_twice || state.key_taken(&order.user_id, key) {
                    return Err(StoreError::DuplicateIdempotencyKey {
                        user_id: order.user_id.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }

        for order in self.orders {
            state.sequence.push(order.id);
            state.items.entry(order.id).or_default();
            state.orders.insert(order.id, order);
        }
        for item in self.items {
            state.items.entry(item.order_id).or_default().push(item);
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!(
            staged_orders = self.orders.len(),
            staged_items = self.items.len(),
            "in-memory transaction rolled back"
        );
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            claims: Arc::clone(&self.claims),
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
            orders: Vec::new(),
            items: Vec::new(),
            held_keys: Vec::new(),
        })
    }

    async fn load_order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>> {
        Ok(self.state.read().await.load(order_id))
    }

    async fn load_orders_by_user(&self, user_id: &UserId) -> Result<Vec<OrderWithItems>> {
        let state = self.state.read().await;
        Ok(state
            .sequence
            .iter()
            .filter_map(|id| state.load(*id))
            .filter(|o| &o.order.user_id == user_id)
            .collect())
    }

    async fn find_order_by_idempotency_key(
        &self,
        user_id: &UserId,
        key: &str,
    ) -> Result<Option<OrderId>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| &o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
            .map(|o| o.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProductId;

    fn order_for(user: &str, key: Option<&str>) -> Order {
        Order::pending(UserId::new(user), key.map(String::from))
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = InMemoryOrderStore::new();
        let order = order_for("u1", None);
        let item = OrderItem::new(order.id, ProductId::new("P1"), 2, Money::from_cents(1050));

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.insert_order_item(&item).await.unwrap();
        tx.update_order_total(order.id, Money::from_cents(2100))
            .await
            .unwrap();

        assert!(store.load_order_with_items(order.id).await.unwrap().is_none());

        tx.commit().await.unwrap();

        let loaded = store.load_order_with_items(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.order.total, Money::from_cents(2100));
        assert_eq!(loaded.items, vec![item]);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let store = InMemoryOrderStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order_for("u1", None)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order_for("u1", None)).await.unwrap();
        drop(tx);

        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_on_commit() {
        let store = InMemoryOrderStore::new();
        store.set_fail_on_commit(true);

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order_for("u1", None)).await.unwrap();
        let result = tx.commit().await;

        assert!(matches!(result, Err(StoreError::CommitFailed(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_total_requires_staged_order() {
        let store = InMemoryOrderStore::new();
        let mut tx = store.begin().await.unwrap();
        let result = tx.update_order_total(OrderId::new(), Money::zero()).await;
        assert!(matches!(result, Err(StoreError::OrderNotStaged(_))));
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_rejected() {
        let store = InMemoryOrderStore::new();

        let first = order_for("u1", Some("key-1"));
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&first).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_order(&order_for("u1", Some("key-1"))).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateIdempotencyKey { .. })
        ));
        drop(tx);

        // Same key for another user is fine
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order_for("u2", Some("key-1"))).await.unwrap();
        tx.commit().await.unwrap();

        let found = store
            .find_order_by_idempotency_key(&UserId::new("u1"), "key-1")
            .await
            .unwrap();
        assert_eq!(found, Some(first.id));
        assert_eq!(store.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_open_key_claim_blocks_second_insert_until_commit() {
        let store = InMemoryOrderStore::new();

        let first = order_for("u1", Some("key-1"));
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&first).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                tx.insert_order(&order_for("u1", Some("key-1"))).await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        tx.commit().await.unwrap();

        let result = contender.await.unwrap();
        assert!(matches!(
            result,
            Err(StoreError::DuplicateIdempotencyKey { .. })
        ));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_key_claim_released_on_rollback() {
        let store = InMemoryOrderStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order_for("u1", Some("key-1"))).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                tx.insert_order(&order_for("u1", Some("key-1"))).await?;
                tx.commit().await
            })
        };

        tx.rollback().await.unwrap();

        contender.await.unwrap().unwrap();
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_orders_by_user_in_commit_order() {
        let store = InMemoryOrderStore::new();
        let mut ids = Vec::new();

        for user in ["u1", "u2", "u1"] {
            let order = order_for(user, None);
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(&order).await.unwrap();
            tx.commit().await.unwrap();
            ids.push(order.id);
        }

        let orders = store.load_orders_by_user(&UserId::new("u1")).await.unwrap();
        let loaded: Vec<OrderId> = orders.iter().map(|o| o.order.id).collect();
        assert_eq!(loaded, vec![ids[0], ids[2]]);
    }
}
