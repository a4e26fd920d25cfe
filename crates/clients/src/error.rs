//! Client error types.

use common::{ProductId, UserId};
use thiserror::Error;

/// Errors returned by the identity authority.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity authority does not know this user.
    #[error("User not found: {0}")]
    NotFound(UserId),

    /// The identity authority could not be reached or answered abnormally.
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the inventory authority.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The catalog has no product with this ID.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The inventory service could not be reached or answered abnormally.
    #[error("Inventory service unavailable: {0}")]
    Unavailable(String),

    /// The inventory service refused a quantity adjustment.
    #[error("Quantity change for product {product_id} rejected: {reason}")]
    Rejected {
        product_id: ProductId,
        reason: String,
    },
}

/// Errors raised while constructing an HTTP client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The configured base URL cannot be used.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The underlying HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
