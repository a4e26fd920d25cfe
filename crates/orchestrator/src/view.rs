//! Read models returned to callers.

use clients::ProductSnapshot;
use common::{Money, OrderItemId, ProductId};
use order_store::{Order, OrderItem, OrderWithItems};
use serde::Serialize;

/// An order with every item enriched by a current product snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineDetails>,
}

/// A stored order item plus the product as it looks now.
///
/// `price` is the frozen price from creation time; `product.price` is
/// whatever the catalog reports today.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineDetails {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product: ProductSnapshot,
    pub quantity: u32,
    pub price: Money,
}

impl OrderLineDetails {
    fn new(item: OrderItem, product: ProductSnapshot) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product,
            quantity: item.quantity,
            price: item.price,
        }
    }

    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

impl OrderDetails {
    /// Pairs stored items with their snapshots, which must be in item order.
    pub(crate) fn new(record: OrderWithItems, products: Vec<ProductSnapshot>) -> Self {
        let items = record
            .items
            .into_iter()
            .zip(products)
            .map(|(item, product)| OrderLineDetails::new(item, product))
            .collect();

        Self {
            order: record.order,
            items,
        }
    }

    /// Sum of `quantity × price` over the items.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderLineDetails::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;

    #[test]
    fn test_serializes_flat_order_with_items() {
        let order = Order::pending(UserId::new("u1"), None);
        let item = OrderItem::new(order.id, ProductId::new("P1"), 2, Money::from_cents(1050));
        let record = OrderWithItems {
            order,
            items: vec![item],
        };
        let product = ProductSnapshot::new("P1", "Widget", Money::from_cents(1200), 98);

        let details = OrderDetails::new(record, vec![product]);
        assert_eq!(details.items_total(), Money::from_cents(2100));

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["status"], "pending");
        assert!(json.get("idempotency_key").is_none());
        assert_eq!(json["items"][0]["product_id"], "P1");
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(json["items"][0]["product"]["name"], "Widget");
    }
}
