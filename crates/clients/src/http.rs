//! HTTP implementations of the collaborator clients.
//!
//! | collaborator | call | request |
//! |--------------|------|---------|
//! | identity | resolve | `GET {base}/users/{id}` |
//! | inventory | fetch | `GET {base}/products/{id}` |
//! | inventory | apply_delta | `PATCH {base}/products/{id}/quantity` with `{"change": n}` |
//!
//! Every call is bounded by the client timeout; there is no retry.

use std::time::Duration;

use async_trait::async_trait;
use common::{ProductId, UserId};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use crate::error::{ClientBuildError, IdentityError, InventoryError};
use crate::identity::{IdentityClient, UserRecord};
use crate::inventory::{InventoryClient, ProductSnapshot};

/// Default per-call timeout for remote collaborators.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn parse_base_url(base_url: &str) -> Result<Url, ClientBuildError> {
    let url = Url::parse(base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(ClientBuildError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: "URL cannot carry a path".to_string(),
        });
    }
    Ok(url)
}

fn build_client(timeout: Duration) -> Result<Client, ClientBuildError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Appends percent-encoded path segments to the base URL.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Identity client that talks to the auth service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    client: Client,
    base_url: Url,
}

impl HttpIdentityClient {
    /// Creates a client for the identity service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn resolve(&self, user_id: &UserId) -> Result<UserRecord, IdentityError> {
        let url = endpoint(&self.base_url, &["users", user_id.as_str()]);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<UserRecord>()
                .await
                .map_err(|e| IdentityError::Unavailable(format!("invalid user payload: {e}")));
        }

        tracing::debug!(%status, "identity service refused user");
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Err(
                IdentityError::Unavailable(format!("identity service returned {status}")),
            ),
            status if status.is_client_error() => Err(IdentityError::NotFound(user_id.clone())),
            status => Err(IdentityError::Unavailable(format!(
                "identity service returned {status}"
            ))),
        }
    }
}

#[derive(Serialize)]
struct QuantityChange {
    change: i64,
}

/// Inventory client that talks to the product service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: Url,
}

impl HttpInventoryClient {
    /// Creates a client for the product service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn fetch(&self, product_id: &ProductId) -> Result<ProductSnapshot, InventoryError> {
        let url = endpoint(&self.base_url, &["products", product_id.as_str()]);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InventoryError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<ProductSnapshot>()
                .await
                .map_err(|e| InventoryError::Unavailable(format!("invalid product payload: {e}"))),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                Err(InventoryError::ProductNotFound(product_id.clone()))
            }
            status => Err(InventoryError::Unavailable(format!(
                "product service returned {status}"
            ))),
        }
    }

    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn apply_delta(
        &self,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<(), InventoryError> {
        let url = endpoint(&self.base_url, &["products", product_id.as_str(), "quantity"]);

        let response = self
            .client
            .patch(url)
            .json(&QuantityChange { change: delta })
            .send()
            .await
            .map_err(|e| InventoryError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status @ (StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY) => {
                let body = response.text().await.unwrap_or_default();
                let reason = if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.trim().to_string()
                };
                Err(InventoryError::Rejected {
                    product_id: product_id.clone(),
                    reason,
                })
            }
            status => Err(InventoryError::Unavailable(format!(
                "product service returned {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_segments() {
        let base = parse_base_url("http://localhost:8082").unwrap();
        let url = endpoint(&base, &["products", "P1", "quantity"]);
        assert_eq!(url.as_str(), "http://localhost:8082/products/P1/quantity");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_ids() {
        let base = parse_base_url("http://localhost:8081/api/v1/").unwrap();
        let url = endpoint(&base, &["users", "a/b"]);
        assert_eq!(url.as_str(), "http://localhost:8081/api/v1/users/a%2Fb");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            HttpIdentityClient::new("not a url", DEFAULT_TIMEOUT),
            Err(ClientBuildError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            HttpInventoryClient::new("mailto:ops@example.com", DEFAULT_TIMEOUT),
            Err(ClientBuildError::InvalidBaseUrl { .. })
        ));
    }
}
