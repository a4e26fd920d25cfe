//! Order orchestrator coordinating identity, inventory and the order store.

use std::time::Instant;

use clients::{IdentityClient, InventoryClient, ProductSnapshot};
use common::{Money, OrderId, ProductId, UserId};
use futures_util::future::join_all;
use order_store::{Order, OrderItem, OrderStore, OrderTransaction, OrderWithItems, StoreError};

use crate::command::{CompensationPolicy, CreateOrder, OrderLine};
use crate::error::{OrderError, Result};
use crate::view::OrderDetails;

/// A decrement that reached the inventory service.
#[derive(Debug, Clone)]
struct AppliedDelta {
    product_id: ProductId,
    quantity: u32,
}

/// Creates orders against remote identity and inventory services and a
/// local transactional store.
///
/// Lines are processed strictly in request order: fetch the product, check
/// stock, stage the item at the snapshot price, then decrement inventory.
/// The order becomes visible only when the whole local transaction commits.
/// Decrements already applied when a later step fails are reversed according
/// to the [`CompensationPolicy`].
#[derive(Debug, Clone)]
pub struct OrderOrchestrator<S, I, U>
where
    S: OrderStore,
    I: InventoryClient,
    U: IdentityClient,
{
    store: S,
    inventory: I,
    identity: U,
    compensation: CompensationPolicy,
}

impl<S, I, U> OrderOrchestrator<S, I, U>
where
    S: OrderStore,
    I: InventoryClient,
    U: IdentityClient,
{
    /// Creates a new orchestrator with reverse-delta compensation.
    pub fn new(store: S, inventory: I, identity: U) -> Self {
        Self {
            store,
            inventory,
            identity,
            compensation: CompensationPolicy::default(),
        }
    }

    /// Sets the compensation policy.
    pub fn with_compensation(mut self, compensation: CompensationPolicy) -> Self {
        self.compensation = compensation;
        self
    }

    /// Returns the order store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order and returns it as stored.
    ///
    /// With an idempotency key, a repeat of an already committed request
    /// returns the original order without touching inventory.
    #[tracing::instrument(
        skip(self, cmd),
        fields(user_id = %cmd.user_id, lines = cmd.lines.len())
    )]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderDetails> {
        let started = Instant::now();
        let result = self.try_create_order(cmd).await;

        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.order.id,
                    total = %order.order.total,
                    "order created"
                );
            }
            Err(err) => {
                metrics::counter!("order_creation_failures_total", "reason" => err.reason())
                    .increment(1);
                tracing::warn!(reason = err.reason(), error = %err, "order creation failed");
            }
        }

        result
    }

    async fn try_create_order(&self, cmd: CreateOrder) -> Result<OrderDetails> {
        cmd.validate()?;

        self.identity.resolve(&cmd.user_id).await?;

        if let Some(key) = cmd.idempotency_key.as_deref()
            && let Some(existing) = self
                .store
                .find_order_by_idempotency_key(&cmd.user_id, key)
                .await?
        {
            return self.replay(existing).await;
        }

        let order = Order::pending(cmd.user_id.clone(), cmd.idempotency_key.clone());
        let mut applied = Vec::with_capacity(cmd.lines.len());

        if let Err(err) = self.place(&order, &cmd.lines, &mut applied).await {
            self.compensate(order.id, &applied).await;
            return self.recover_duplicate(&cmd, err).await;
        }

        self.get_order_by_id(order.id).await
    }

    /// Runs the local transaction, recording each inventory decrement.
    async fn place(
        &self,
        order: &Order,
        lines: &[OrderLine],
        applied: &mut Vec<AppliedDelta>,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;

        match self.stage(&mut tx, order, lines, applied).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(order_id = %order.id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn stage(
        &self,
        tx: &mut S::Transaction,
        order: &Order,
        lines: &[OrderLine],
        applied: &mut Vec<AppliedDelta>,
    ) -> Result<()> {
        tx.insert_order(order).await?;

        let mut total = Money::zero();
        for (line_no, line) in (0u32..).zip(lines) {
            let product = self.inventory.fetch(&line.product_id).await?;

            if i64::from(line.quantity) > product.quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available: product.quantity,
                    requested: line.quantity,
                });
            }

            let item = OrderItem::new(
                order.id,
                line.product_id.clone(),
                line.quantity,
                product.price,
            )
            .at_line(line_no);
            tx.insert_order_item(&item).await?;

            self.inventory
                .apply_delta(&line.product_id, -i64::from(line.quantity))
                .await?;
            applied.push(AppliedDelta {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            });
            tracing::debug!(
                line = line_no,
                product_id = %line.product_id,
                quantity = line.quantity,
                "line placed"
            );

            total += item.line_total();
        }

        tx.update_order_total(order.id, total).await?;
        Ok(())
    }

    /// Reverses applied decrements, newest first.
    ///
    /// Failures are logged and counted; they never replace the error that
    /// triggered compensation.
    #[tracing::instrument(skip(self, applied), fields(applied = applied.len()))]
    async fn compensate(&self, order_id: OrderId, applied: &[AppliedDelta]) {
        if applied.is_empty() {
            return;
        }

        if self.compensation == CompensationPolicy::Disabled {
            metrics::counter!("inventory_compensations_total", "outcome" => "skipped")
                .increment(applied.len() as u64);
            tracing::warn!(%order_id, "inventory decrements left in place");
            return;
        }

        for delta in applied.iter().rev() {
            match self
                .inventory
                .apply_delta(&delta.product_id, i64::from(delta.quantity))
                .await
            {
                Ok(()) => {
                    metrics::counter!("inventory_compensations_total", "outcome" => "restored")
                        .increment(1);
                    tracing::info!(
                        product_id = %delta.product_id,
                        quantity = delta.quantity,
                        "inventory restored"
                    );
                }
                Err(e) => {
                    metrics::counter!("inventory_compensations_total", "outcome" => "failed")
                        .increment(1);
                    tracing::warn!(
                        product_id = %delta.product_id,
                        quantity = delta.quantity,
                        error = %e,
                        "inventory compensation failed"
                    );
                }
            }
        }
    }

    /// Turns a lost idempotency race into a replay of the winning order.
    async fn recover_duplicate(&self, cmd: &CreateOrder, err: OrderError) -> Result<OrderDetails> {
        let OrderError::Persistence(StoreError::DuplicateIdempotencyKey { .. }) = &err else {
            return Err(err);
        };
        let Some(key) = cmd.idempotency_key.as_deref() else {
            return Err(err);
        };

        match self
            .store
            .find_order_by_idempotency_key(&cmd.user_id, key)
            .await?
        {
            Some(winner) => self.replay(winner).await,
            None => Err(err),
        }
    }

    async fn replay(&self, order_id: OrderId) -> Result<OrderDetails> {
        metrics::counter!("idempotent_replays_total").increment(1);
        tracing::info!(%order_id, "returning existing order for idempotency key");
        self.get_order_by_id(order_id).await
    }

    /// Loads an order with current product snapshots for display.
    ///
    /// Ownership is not checked here.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_id(&self, order_id: OrderId) -> Result<OrderDetails> {
        let record = self
            .store
            .load_order_with_items(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        Ok(self.enrich(record).await)
    }

    /// Loads every order owned by a user, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders_by_user_id(&self, user_id: &UserId) -> Result<Vec<OrderDetails>> {
        let records = self.store.load_orders_by_user(user_id).await?;

        let mut orders = Vec::with_capacity(records.len());
        for record in records {
            orders.push(self.enrich(record).await);
        }
        Ok(orders)
    }

    async fn enrich(&self, record: OrderWithItems) -> OrderDetails {
        let products = join_all(record.items.iter().map(|item| self.snapshot_for(item))).await;
        OrderDetails::new(record, products)
    }

    async fn snapshot_for(&self, item: &OrderItem) -> ProductSnapshot {
        match self.inventory.fetch(&item.product_id).await {
            Ok(product) => product,
            Err(e) => {
                tracing::debug!(
                    product_id = %item.product_id,
                    error = %e,
                    "product unavailable for display"
                );
                ProductSnapshot::unavailable(item.product_id.clone(), item.price)
            }
        }
    }
}
