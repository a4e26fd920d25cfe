//! Clients for the remote collaborators of the order orchestrator.
//!
//! - [`IdentityClient`] confirms that a user identifier is known.
//! - [`InventoryClient`] reads product snapshots and applies signed
//!   quantity deltas against the catalog.
//!
//! Each contract has a reqwest-backed HTTP implementation and an
//! in-memory double for tests.

pub mod error;
pub mod http;
pub mod identity;
pub mod inventory;

pub use error::{ClientBuildError, IdentityError, InventoryError};
pub use http::{DEFAULT_TIMEOUT, HttpIdentityClient, HttpInventoryClient};
pub use identity::{IdentityClient, InMemoryIdentityClient, UserRecord};
pub use inventory::{InMemoryInventoryClient, InventoryClient, ProductSnapshot};
