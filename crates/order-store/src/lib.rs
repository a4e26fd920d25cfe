pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{Money, OrderId, OrderItemId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryTransaction};
pub use model::{Order, OrderItem, OrderStatus, OrderWithItems};
pub use postgres::{PostgresOrderStore, PostgresTransaction};
pub use store::{OrderStore, OrderTransaction};
