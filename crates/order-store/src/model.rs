//! Persisted order rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, OrderItemId, ProductId, StoreError, UserId};

/// Lifecycle status of an order.
///
/// Orders are only ever created as `Pending`; later states belong to
/// whichever collaborator takes over fulfilment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
}

impl OrderStatus {
    /// Returns the storage/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            other => Err(StoreError::CorruptRow(format!("unknown order status '{other}'"))),
        }
    }
}

/// An order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// Sum of `quantity × price` over the order's items.
    pub total: Money,
    /// Client-supplied key that makes creation retry-safe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order with a zero total.
    pub fn pending(user_id: UserId, idempotency_key: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::Pending,
            total: Money::zero(),
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A line of an order with its frozen unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price captured from the catalog when the order was created.
    pub price: Money,
    /// Position of the line in the creation request, starting at 0.
    #[serde(default)]
    pub line_no: u32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Creates a new item for an order.
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: u32, price: Money) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            product_id,
            quantity,
            price,
            line_no: 0,
            created_at: Utc::now(),
        }
    }

    /// Sets the item's position within its order.
    pub fn at_line(mut self, line_no: u32) -> Self {
        self.line_no = line_no;
        self
    }

    /// Returns `quantity × price`.
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// An order loaded together with all of its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    /// Recomputes the total from the items.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        let status: OrderStatus = "pending".parse().unwrap();
        assert_eq!(status, OrderStatus::Pending);
        assert_eq!(status.to_string(), "pending");
    }

    #[test]
    fn test_unknown_status_is_corrupt_row() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow(_)));
    }

    #[test]
    fn test_pending_order_starts_at_zero() {
        let order = Order::pending(UserId::new("u1"), None);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.total.is_zero());
    }

    #[test]
    fn test_items_total() {
        let order = Order::pending(UserId::new("u1"), None);
        let items = vec![
            OrderItem::new(order.id, ProductId::new("P1"), 2, Money::from_cents(1050)),
            OrderItem::new(order.id, ProductId::new("P2"), 1, Money::from_cents(2500)),
        ];
        let loaded = OrderWithItems { order, items };
        assert_eq!(loaded.items_total(), Money::from_cents(4600));
    }
}
