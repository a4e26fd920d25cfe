//! Bearer token authentication.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use common::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT claims issued by the auth service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
}

/// Verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Returns the user named by a valid token.
    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {e}");
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })?;

        if data.claims.user_id.trim().is_empty() {
            return Err(ApiError::Unauthorized("Token has no user".to_string()));
        }
        Ok(UserId::new(data.claims.user_id))
    }
}

/// Issues a token for a user, valid for `ttl`.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        user_id: user_id.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Middleware that stores the authenticated [`UserId`] in request extensions.
pub async fn require_user(
    State(verifier): State<Arc<JwtVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".to_string()))?;

    let user_id = verifier.verify(token.trim())?;
    request.extensions_mut().insert(user_id);

    Ok(next.run(request).await)
}
