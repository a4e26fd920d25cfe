//! Order creation commands.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};

/// Largest quantity accepted on a single line.
pub const MAX_LINE_QUANTITY: u32 = 1000;

/// One requested product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Command to create a new order for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    pub user_id: UserId,
    /// Processed strictly in this order.
    pub lines: Vec<OrderLine>,
    /// Makes the command safe to retry when set.
    pub idempotency_key: Option<String>,
}

impl CreateOrder {
    pub fn new(user_id: impl Into<UserId>, lines: Vec<OrderLine>) -> Self {
        Self {
            user_id: user_id.into(),
            lines,
            idempotency_key: None,
        }
    }

    /// Attaches an idempotency key to the command.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Checks the command without contacting any collaborator.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(OrderError::InvalidRequest("user id is required".to_string()));
        }

        if self.lines.is_empty() {
            return Err(OrderError::InvalidRequest(
                "order must contain at least one item".to_string(),
            ));
        }

        for (index, line) in self.lines.iter().enumerate() {
            if line.product_id.is_blank() {
                return Err(OrderError::InvalidRequest(format!(
                    "item {index}: product id is required"
                )));
            }
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::InvalidRequest(format!(
                    "item {index}: quantity must be between 1 and {MAX_LINE_QUANTITY}"
                )));
            }
        }

        if let Some(key) = &self.idempotency_key
            && key.trim().is_empty()
        {
            return Err(OrderError::InvalidRequest(
                "idempotency key must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}

/// What happens to inventory decrements already applied when a later step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompensationPolicy {
    /// Issue reverse deltas for every applied line, newest first.
    #[default]
    ReverseDeltas,
    /// Leave applied decrements in place.
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_command() {
        let cmd = CreateOrder::new("u1", vec![OrderLine::new("P1", 2), OrderLine::new("P2", 1)]);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_empty_lines_rejected() {
        let cmd = CreateOrder::new("u1", vec![]);
        assert!(matches!(cmd.validate(), Err(OrderError::InvalidRequest(_))));
    }

    #[test]
    fn test_quantity_bounds() {
        let zero = CreateOrder::new("u1", vec![OrderLine::new("P1", 0)]);
        assert!(matches!(zero.validate(), Err(OrderError::InvalidRequest(_))));

        let max = CreateOrder::new("u1", vec![OrderLine::new("P1", MAX_LINE_QUANTITY)]);
        assert!(max.validate().is_ok());

        let over = CreateOrder::new("u1", vec![OrderLine::new("P1", MAX_LINE_QUANTITY + 1)]);
        assert!(matches!(over.validate(), Err(OrderError::InvalidRequest(_))));
    }

    #[test]
    fn test_blank_product_and_user_rejected() {
        let blank_product = CreateOrder::new("u1", vec![OrderLine::new("  ", 1)]);
        assert!(matches!(
            blank_product.validate(),
            Err(OrderError::InvalidRequest(_))
        ));

        let blank_user = CreateOrder::new("", vec![OrderLine::new("P1", 1)]);
        assert!(matches!(
            blank_user.validate(),
            Err(OrderError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_blank_idempotency_key_rejected() {
        let cmd = CreateOrder::new("u1", vec![OrderLine::new("P1", 1)]).with_idempotency_key(" ");
        assert!(matches!(cmd.validate(), Err(OrderError::InvalidRequest(_))));
    }

    #[test]
    fn test_line_deserializes_from_request_json() {
        let line: OrderLine =
            serde_json::from_str(r#"{"product_id":"P1","quantity":2}"#).unwrap();
        assert_eq!(line, OrderLine::new("P1", 2));
    }
}
