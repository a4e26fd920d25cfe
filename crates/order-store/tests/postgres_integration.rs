//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use order_store::{
    Money, Order, OrderId, OrderItem, OrderStore, OrderTransaction, PostgresOrderStore, ProductId,
    StoreError, UserId,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_orders_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

async fn commit_order(
    store: &PostgresOrderStore,
    user: &str,
    key: Option<&str>,
    lines: &[(&str, u32, i64)],
) -> OrderId {
    let order = Order::pending(UserId::new(user), key.map(String::from));
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();

    let mut total = Money::zero();
    for (line_no, (product, quantity, cents)) in (0u32..).zip(lines) {
        let item = OrderItem::new(
            order.id,
            ProductId::new(*product),
            *quantity,
            Money::from_cents(*cents),
        )
        .at_line(line_no);
        total += item.line_total();
        tx.insert_order_item(&item).await.unwrap();
    }
    tx.update_order_total(order.id, total).await.unwrap();
    tx.commit().await.unwrap();
    order.id
}

#[tokio::test]
async fn commit_and_load_order_with_items() {
    let store = get_test_store().await;

    let order_id = commit_order(&store, "u1", None, &[("P1", 2, 1050), ("P2", 1, 2500)]).await;

    let loaded = store.load_order_with_items(order_id).await.unwrap().unwrap();
    assert_eq!(loaded.order.user_id, UserId::new("u1"));
    assert_eq!(loaded.order.total, Money::from_cents(4600));
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items_total(), loaded.order.total);
}

#[tokio::test]
async fn items_load_in_line_order_when_timestamps_tie() {
    let store = get_test_store().await;
    let order = Order::pending(UserId::new("u1"), None);
    let created_at = order.created_at;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    for line_no in 0..20u32 {
        let mut item = OrderItem::new(
            order.id,
            ProductId::new(format!("P{line_no:02}")),
            1,
            Money::from_cents(100),
        )
        .at_line(line_no);
        item.created_at = created_at;
        tx.insert_order_item(&item).await.unwrap();
    }
    tx.commit().await.unwrap();

    let loaded = store.load_order_with_items(order.id).await.unwrap().unwrap();
    let lines: Vec<u32> = loaded.items.iter().map(|item| item.line_no).collect();
    assert_eq!(lines, (0..20).collect::<Vec<_>>());
    assert_eq!(loaded.items[7].product_id, ProductId::new("P07"));
}

#[tokio::test]
async fn uncommitted_writes_are_invisible() {
    let store = get_test_store().await;
    let order = Order::pending(UserId::new("u1"), None);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.insert_order_item(&OrderItem::new(
        order.id,
        ProductId::new("P1"),
        1,
        Money::from_cents(100),
    ))
    .await
    .unwrap();

    assert!(store.load_order_with_items(order.id).await.unwrap().is_none());

    tx.rollback().await.unwrap();
    assert!(store.load_order_with_items(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let store = get_test_store().await;
    let order = Order::pending(UserId::new("u1"), None);

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
    }

    assert!(store.load_order_with_items(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn load_orders_by_user_filters_and_orders() {
    let store = get_test_store().await;

    let first = commit_order(&store, "u1", None, &[("P1", 1, 100)]).await;
    commit_order(&store, "u2", None, &[("P1", 1, 100)]).await;
    let second = commit_order(&store, "u1", None, &[("P2", 3, 250)]).await;

    let orders = store.load_orders_by_user(&UserId::new("u1")).await.unwrap();
    let ids: Vec<OrderId> = orders.iter().map(|o| o.order.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(orders[1].order.total, Money::from_cents(750));
}

#[tokio::test]
async fn idempotency_key_is_unique_per_user() {
    let store = get_test_store().await;

    let original = commit_order(&store, "u1", Some("retry-1"), &[("P1", 1, 100)]).await;

    let duplicate = Order::pending(UserId::new("u1"), Some("retry-1".to_string()));
    let mut tx = store.begin().await.unwrap();
    let result = tx.insert_order(&duplicate).await;
    assert!(matches!(
        result,
        Err(StoreError::DuplicateIdempotencyKey { .. })
    ));
    drop(tx);

    commit_order(&store, "u2", Some("retry-1"), &[("P1", 1, 100)]).await;

    let found = store
        .find_order_by_idempotency_key(&UserId::new("u1"), "retry-1")
        .await
        .unwrap();
    assert_eq!(found, Some(original));
}

#[tokio::test]
async fn update_total_for_unknown_order_fails() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    let result = tx.update_order_total(OrderId::new(), Money::zero()).await;
    assert!(matches!(result, Err(StoreError::OrderNotStaged(_))));
}

#[tokio::test]
async fn missing_order_returns_none() {
    let store = get_test_store().await;
    assert!(
        store
            .load_order_with_items(OrderId::new())
            .await
            .unwrap()
            .is_none()
    );
}
