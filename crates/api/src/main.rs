//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use clients::{HttpIdentityClient, HttpInventoryClient, IdentityClient, InventoryClient};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!("orders_created_total", "Orders committed");
    metrics::describe_counter!(
        "order_creation_failures_total",
        "Order creation attempts that failed, by reason"
    );
    metrics::describe_histogram!(
        "order_creation_duration_seconds",
        metrics::Unit::Seconds,
        "End-to-end order creation latency"
    );
    metrics::describe_counter!(
        "inventory_compensations_total",
        "Inventory decrements reversed or left in place after a failure, by outcome"
    );
    metrics::describe_counter!(
        "idempotent_replays_total",
        "Creation requests answered with an existing order"
    );
}

async fn serve<S: OrderStore + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let identity: Arc<dyn IdentityClient> = Arc::new(
        HttpIdentityClient::new(&config.auth_service_url, config.remote_timeout)
            .expect("invalid AUTH_SERVICE_URL"),
    );
    let inventory: Arc<dyn InventoryClient> = Arc::new(
        HttpInventoryClient::new(&config.product_service_url, config.remote_timeout)
            .expect("invalid PRODUCT_SERVICE_URL"),
    );

    let state = api::create_default_state(store, inventory, identity, config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load .env and configuration
    dotenv::dotenv().ok();
    let config = Config::from_env();

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    tracing::info!(
        auth_service = %config.auth_service_url,
        product_service = %config.product_service_url,
        compensation = ?config.compensation_policy(),
        "configuration loaded"
    );

    // 4. Pick the order store and serve
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresOrderStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL order store");
            serve(store, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            serve(InMemoryOrderStore::new(), &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
