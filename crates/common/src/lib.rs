//! Shared types used across the order orchestrator crates.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, OrderItemId, ProductId, UserId};
