//! Inventory client trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Display name used when a product can no longer be fetched.
pub const UNAVAILABLE_PRODUCT_NAME: &str = "Product not available";

/// Point-in-time view of a catalog product.
///
/// Never cached beyond a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    /// Available quantity as reported by the catalog.
    pub quantity: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ProductSnapshot {
    /// Creates a snapshot with the essential fields set.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        quantity: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            quantity,
            category: String::new(),
            sku: String::new(),
            images: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Placeholder shown when a product cannot be re-fetched for display.
    pub fn unavailable(id: ProductId, price: Money) -> Self {
        Self::new(id, UNAVAILABLE_PRODUCT_NAME, price, 0)
    }
}

/// Reads product snapshots and adjusts quantities in the remote catalog.
///
/// `fetch` and `apply_delta` are not atomic with each other. Implementations
/// must refuse a delta whose resulting quantity would be negative.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Fetches the current snapshot of a product.
    async fn fetch(&self, product_id: &ProductId) -> Result<ProductSnapshot, InventoryError>;

    /// Applies a signed quantity change to a product.
    async fn apply_delta(&self, product_id: &ProductId, delta: i64)
    -> Result<(), InventoryError>;
}

#[async_trait]
impl<T: InventoryClient + ?Sized> InventoryClient for Arc<T> {
    async fn fetch(&self, product_id: &ProductId) -> Result<ProductSnapshot, InventoryError> {
        (**self).fetch(product_id).await
    }

    async fn apply_delta(
        &self,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<(), InventoryError> {
        (**self).apply_delta(product_id, delta).await
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<ProductId, ProductSnapshot>,
    unavailable: bool,
    fail_apply_delta_for: HashSet<ProductId>,
    delta_log: Vec<(ProductId, i64)>,
}

/// In-memory inventory client for testing.
///
/// Applies deltas atomically under its lock and rejects any change that
/// would drive a quantity below zero.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryClient {
    /// Creates a new in-memory inventory client with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn put_product(&self, product: ProductSnapshot) {
        self.write().products.insert(product.id.clone(), product);
    }

    /// Removes a product from the catalog.
    pub fn remove_product(&self, product_id: &ProductId) {
        self.write().products.remove(product_id);
    }

    /// Changes the catalog price of a product.
    pub fn set_price(&self, product_id: &ProductId, price: Money) {
        if let Some(product) = self.write().products.get_mut(product_id) {
            product.price = price;
        }
    }

    /// Returns the current quantity of a product.
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<i64> {
        self.read().products.get(product_id).map(|p| p.quantity)
    }

    /// Configures the client to fail every call as unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    /// Configures `apply_delta` to fail as unreachable for one product.
    pub fn fail_apply_delta_for(&self, product_id: impl Into<ProductId>) {
        self.write().fail_apply_delta_for.insert(product_id.into());
    }

    /// Returns every delta that was applied, in order.
    pub fn delta_log(&self) -> Vec<(ProductId, i64)> {
        self.read().delta_log.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryInventoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryInventoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn fetch(&self, product_id: &ProductId) -> Result<ProductSnapshot, InventoryError> {
        let state = self.read();

        if state.unavailable {
            return Err(InventoryError::Unavailable(
                "inventory service offline".to_string(),
            ));
        }

        state
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    async fn apply_delta(
        &self,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<(), InventoryError> {
        let mut state = self.write();

        if state.unavailable || state.fail_apply_delta_for.contains(product_id) {
            return Err(InventoryError::Unavailable(
                "inventory service offline".to_string(),
            ));
        }

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::Rejected {
                product_id: product_id.clone(),
                reason: "product not found".to_string(),
            })?;

        let resulting = product.quantity + delta;
        if resulting < 0 {
            return Err(InventoryError::Rejected {
                product_id: product_id.clone(),
                reason: format!(
                    "insufficient quantity: available {}, change {delta}",
                    product.quantity
                ),
            });
        }

        product.quantity = resulting;
        state.delta_log.push((product_id.clone(), delta));
        Ok(())
    }
}
