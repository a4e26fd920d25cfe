//! Order creation orchestration.
//!
//! Validates a request, resolves the user, then for each line fetches the
//! product, freezes its price into an order item and decrements inventory,
//! all inside one local transaction. Reads re-fetch products for display.

pub mod command;
pub mod error;
pub mod orchestrator;
pub mod view;

pub use command::{CompensationPolicy, CreateOrder, MAX_LINE_QUANTITY, OrderLine};
pub use error::{OrderError, Result};
pub use orchestrator::OrderOrchestrator;
pub use view::{OrderDetails, OrderLineDetails};
