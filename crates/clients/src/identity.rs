//! Identity client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// A user as reported by the identity authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Creates a record carrying only the user ID.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            phone: None,
            handle: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Resolves opaque user identifiers against the identity authority.
///
/// Resolution has no side effects.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Confirms the user exists and returns its record.
    async fn resolve(&self, user_id: &UserId) -> Result<UserRecord, IdentityError>;
}

#[async_trait]
impl<T: IdentityClient + ?Sized> IdentityClient for Arc<T> {
    async fn resolve(&self, user_id: &UserId) -> Result<UserRecord, IdentityError> {
        (**self).resolve(user_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryIdentityState {
    users: HashMap<UserId, UserRecord>,
    unavailable: bool,
    resolve_calls: usize,
}

/// In-memory identity client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityClient {
    state: Arc<RwLock<InMemoryIdentityState>>,
}

impl InMemoryIdentityClient {
    /// Creates a new in-memory identity client with no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and returns its ID.
    pub fn add_user(&self, id: impl Into<UserId>) -> UserId {
        let record = UserRecord::new(id);
        let id = record.id.clone();
        self.write().users.insert(id.clone(), record);
        id
    }

    /// Configures the client to fail every call as unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    /// Returns how many times `resolve` was called.
    pub fn resolve_calls(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve_calls
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryIdentityState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityClient for InMemoryIdentityClient {
    async fn resolve(&self, user_id: &UserId) -> Result<UserRecord, IdentityError> {
        let mut state = self.write();
        state.resolve_calls += 1;

        if state.unavailable {
            return Err(IdentityError::Unavailable(
                "identity service offline".to_string(),
            ));
        }

        state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(user_id.clone()))
    }
}
