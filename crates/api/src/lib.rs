//! HTTP API server for order creation.
//!
//! Exposes authenticated endpoints to create and read orders, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use clients::{IdentityClient, InventoryClient};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use orchestrator::OrderOrchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtVerifier;
use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api_router = Router::new()
        .route("/order", post(routes::orders::create::<S>))
        .route("/order/{id}", get(routes::orders::get::<S>))
        .route("/my-orders", get(routes::orders::list_mine::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            auth::require_user,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api_router)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store and remote collaborators.
pub fn create_default_state<S: OrderStore + 'static>(
    store: S,
    inventory: Arc<dyn InventoryClient>,
    identity: Arc<dyn IdentityClient>,
    config: &Config,
) -> Arc<AppState<S>> {
    let orchestrator = OrderOrchestrator::new(store, inventory, identity)
        .with_compensation(config.compensation_policy());

    Arc::new(AppState {
        orchestrator,
        verifier: Arc::new(JwtVerifier::new(&config.jwt_secret)),
    })
}
