//! Product stock projection.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A product with locally-owned available stock.
///
/// Two independently owned copies of this row exist — one in the command
/// service, one in the consumer service — identified by the same numeric id
/// by convention. They are only eventually consistent; reconciliation
/// happens exclusively through the order event stream. Available stock is
/// a `u32`, so no mutation can drive it below zero; a decrement that would
/// is rejected before any change is made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product row.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_serialization_round_trip() {
        let product = Product::new(ProductId::new(5), "Keyboard", Money::from_cents(1000), 10);

        let json = serde_json::to_string(&product).unwrap();
        let parsed: Product = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, ProductId::new(5));
        assert_eq!(parsed.name, "Keyboard");
        assert_eq!(parsed.stock, 10);
        assert_eq!(parsed.price, Money::from_cents(1000));
    }
}
