//! Order orchestration error types.

use clients::{IdentityError, InventoryError};
use common::{OrderId, ProductId};
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur while creating or reading orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request was rejected before any collaborator was contacted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The user could not be resolved.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// A requested product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A line asked for more than the catalog reported available.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// The inventory service could not be reached.
    #[error("Inventory service unavailable: {0}")]
    InventoryUnavailable(String),

    /// The inventory service refused a quantity change.
    #[error("Inventory rejected change for product {product_id}: {reason}")]
    InventoryRejected { product_id: ProductId, reason: String },

    /// The local transaction failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),
}

impl OrderError {
    /// Short label used when recording failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::InvalidRequest(_) => "invalid_request",
            OrderError::Identity(_) => "identity",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InventoryUnavailable(_) => "inventory_unavailable",
            OrderError::InventoryRejected { .. } => "inventory_rejected",
            OrderError::Persistence(_) => "persistence",
            OrderError::NotFound(_) => "not_found",
        }
    }
}

impl From<InventoryError> for OrderError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound(product_id) => OrderError::ProductNotFound(product_id),
            InventoryError::Unavailable(reason) => OrderError::InventoryUnavailable(reason),
            InventoryError::Rejected { product_id, reason } => {
                OrderError::InventoryRejected { product_id, reason }
            }
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_errors_map_to_order_errors() {
        let id = ProductId::new("P1");

        assert!(matches!(
            OrderError::from(InventoryError::ProductNotFound(id.clone())),
            OrderError::ProductNotFound(p) if p == id
        ));
        assert!(matches!(
            OrderError::from(InventoryError::Unavailable("timeout".into())),
            OrderError::InventoryUnavailable(_)
        ));
        assert!(matches!(
            OrderError::from(InventoryError::Rejected {
                product_id: id.clone(),
                reason: "negative".into(),
            }),
            OrderError::InventoryRejected { .. }
        ));
    }

    #[test]
    fn test_insufficient_stock_message_carries_detail() {
        let err = OrderError::InsufficientStock {
            product_id: ProductId::new("P1"),
            available: 100,
            requested: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product P1: available 100, requested 1000"
        );
        assert_eq!(err.reason(), "insufficient_stock");
    }
}
