//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use clients::{IdentityClient, InventoryClient};
use common::{OrderId, UserId};
use order_store::OrderStore;
use orchestrator::{CreateOrder, OrderDetails, OrderLine, OrderOrchestrator};
use serde::{Deserialize, Serialize};

use crate::auth::JwtVerifier;
use crate::error::ApiError;

/// Header carrying a client-chosen key that makes order creation retry-safe.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

/// Orchestrator wired to trait-object collaborators.
pub type Orchestrator<S> = OrderOrchestrator<S, Arc<dyn InventoryClient>, Arc<dyn IdentityClient>>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub orchestrator: Orchestrator<S>,
    pub verifier: Arc<JwtVerifier>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Raw pagination parameters; unusable values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    /// Returns the effective `(page, limit)`.
    pub fn resolve(&self) -> (usize, usize) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIMIT);
        (page, limit)
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderDetails>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

// -- Handlers --

/// `POST /api/v1/order`: create an order for the authenticated user.
#[tracing::instrument(skip(state, user_id, headers, payload), fields(user_id = %user_id))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user_id): Extension<UserId>,
    headers: HeaderMap,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderDetails>), ApiError> {
    let Json(req) = payload?;

    let lines = req
        .items
        .into_iter()
        .map(|item| {
            // Out-of-range quantities become 0 and fail validation.
            let quantity = u32::try_from(item.quantity).unwrap_or(0);
            OrderLine::new(item.product_id, quantity)
        })
        .collect();

    let mut cmd = CreateOrder::new(user_id, lines);
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }

    let order = state.orchestrator.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(|key| key.trim().to_string())
                .map_err(|_| ApiError::BadRequest("Invalid Idempotency-Key header".to_string()))
        })
        .transpose()
}

/// `GET /api/v1/order/{id}`: load one of the caller's orders.
#[tracing::instrument(skip(state, user_id), fields(user_id = %user_id))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id: OrderId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid order id: {id}")))?;

    let order = state.orchestrator.get_order_by_id(order_id).await?;

    if order.order.user_id != user_id {
        tracing::warn!(%order_id, owner = %order.order.user_id, "order access denied");
        return Err(ApiError::Forbidden(
            "You do not have permission to view this order".to_string(),
        ));
    }

    Ok(Json(order))
}

/// `GET /api/v1/my-orders`: page through the caller's orders, oldest first.
#[tracing::instrument(skip(state, user_id, params), fields(user_id = %user_id))]
pub async fn list_mine<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user_id): Extension<UserId>,
    Query(params): Query<PageParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let (page, limit) = params.resolve();

    let orders = state.orchestrator.get_orders_by_user_id(&user_id).await?;
    let total = orders.len();
    let orders = orders
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    Ok(Json(OrderListResponse {
        orders,
        page,
        limit,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(String::from),
            limit: limit.map(String::from),
        }
    }

    #[test]
    fn test_page_defaults() {
        assert_eq!(PageParams::default().resolve(), (1, 10));
    }

    #[test]
    fn test_page_values_used_when_valid() {
        assert_eq!(params(Some("3"), Some("25")).resolve(), (3, 25));
        assert_eq!(params(Some("1"), Some("100")).resolve(), (1, 100));
    }

    #[test]
    fn test_page_invalid_values_fall_back() {
        assert_eq!(params(Some("0"), Some("0")).resolve(), (1, 10));
        assert_eq!(params(Some("abc"), Some("-5")).resolve(), (1, 10));
        assert_eq!(params(Some("2"), Some("101")).resolve(), (2, 10));
    }

    #[test]
    fn test_idempotency_key_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, " retry-1 ".parse().unwrap());
        assert_eq!(
            idempotency_key(&headers).unwrap().as_deref(),
            Some("retry-1")
        );
    }
}
