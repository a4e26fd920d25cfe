use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Money, Order, OrderId, OrderItem, OrderItemId, OrderWithItems, ProductId, Result, StoreError,
    UserId,
    store::{OrderStore, OrderTransaction},
};

const UNIQUE_IDEMPOTENCY_KEY: &str = "unique_user_idempotency_key";

/// PostgreSQL-backed order store implementation.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let total: Decimal = row.try_get("total")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            status: status.parse()?,
            total: Money::new(total),
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let quantity: i32 = row.try_get("quantity")?;
        let price: Decimal = row.try_get("price")?;
        let line_no: i32 = row.try_get("line_no")?;

        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::CorruptRow(format!("negative quantity {quantity}")))?,
            price: Money::new(price),
            line_no: u32::try_from(line_no)
                .map_err(|_| StoreError::CorruptRow(format!("negative line number {line_no}")))?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    /// Loads items for a set of orders and attaches them, preserving order sequence.
    async fn attach_items(&self, orders: Vec<Order>) -> Result<Vec<OrderWithItems>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price, line_no, created_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY line_no ASC, created_at ASC, id ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = Self::row_to_item(row)?;
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}

/// Transaction handle for [`PostgresOrderStore`].
///
/// Wraps a sqlx transaction; dropping it without committing rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_str())
        .bind(order.status.as_str())
        .bind(order.total.amount())
        .bind(order.idempotency_key.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_IDEMPOTENCY_KEY)
            {
                return StoreError::DuplicateIdempotencyKey {
                    user_id: order.user_id.clone(),
                    key: order.idempotency_key.clone().unwrap_or_default(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| StoreError::CorruptRow(format!("quantity {} too large", item.quantity)))?;
        let line_no = i32::try_from(item.line_no).map_err(|_| {
            StoreError::CorruptRow(format!("line number {} too large", item.line_no))
        })?;

        sqlx::query(
            r#"
            INSERT INTO order_items
                (id, order_id, product_id, quantity, price, line_no, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_str())
        .bind(quantity)
        .bind(item.price.amount())
        .bind(line_no)
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_order_total(&mut self, order_id: OrderId, total: Money) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET total = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(total.amount())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotStaged(order_id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn load_order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, user_id, status, total, idempotency_key, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let order = Self::row_to_order(&row)?;
                Ok(self.attach_items(vec![order]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn load_orders_by_user(&self, user_id: &UserId) -> Result<Vec<OrderWithItems>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, status, total, idempotency_key, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(orders).await
    }

    async fn find_order_by_idempotency_key(
        &self,
        user_id: &UserId,
        key: &str,
    ) -> Result<Option<OrderId>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE user_id = $1 AND idempotency_key = $2",
        )
        .bind(user_id.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(OrderId::from_uuid))
    }
}
