//! Stock ledger types: quantity records and append-only movements.

use chrono::{DateTime, Utc};
use common::{EntryId, OrderId, ProductId, VariantId};
use serde::{Deserialize, Serialize};

/// Key identifying a stock record.
///
/// Stock is tracked per product, optionally narrowed to a variant. A
/// product-level record has `variant_id == None`; a variant-level record
/// carries both ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    /// The product the stock belongs to.
    pub product_id: ProductId,

    /// The variant, when stock is tracked at variant granularity.
    pub variant_id: Option<VariantId>,
}

impl StockKey {
    /// A product-level stock key.
    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id,
            variant_id: None,
        }
    }

    /// A variant-level stock key.
    pub fn variant(product_id: ProductId, variant_id: VariantId) -> Self {
        Self {
            product_id,
            variant_id: Some(variant_id),
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.variant_id {
            Some(variant_id) => write!(f, "product {} variant {}", self.product_id, variant_id),
            None => write!(f, "product {}", self.product_id),
        }
    }
}

/// An append-only record of a stock change.
///
/// Every stock mutation caused by an order is paired with exactly one
/// movement; movements are never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    /// Unique movement identifier.
    pub id: EntryId,

    /// The stock key that changed.
    pub key: StockKey,

    /// Signed quantity change.
    pub delta: i64,

    /// Why the stock changed (e.g. "order receipt").
    pub reason: String,

    /// The order that caused the change.
    pub order_id: OrderId,

    /// When the change was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    /// Creates a movement record stamped with the current time.
    pub fn new(key: StockKey, delta: i64, reason: impl Into<String>, order_id: OrderId) -> Self {
        Self {
            id: EntryId::new(),
            key,
            delta,
            reason: reason.into(),
            order_id,
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_key_has_no_variant() {
        let key = StockKey::product(ProductId::new());
        assert!(key.variant_id.is_none());
    }

    #[test]
    fn variant_key_carries_both_ids() {
        let product_id = ProductId::new();
        let variant_id = VariantId::new();
        let key = StockKey::variant(product_id, variant_id);
        assert_eq!(key.product_id, product_id);
        assert_eq!(key.variant_id, Some(variant_id));
    }

    #[test]
    fn keys_at_different_granularity_differ() {
        let product_id = ProductId::new();
        let product_key = StockKey::product(product_id);
        let variant_key = StockKey::variant(product_id, VariantId::new());
        assert_ne!(product_key, variant_key);
    }

    #[test]
    fn movement_records_reason_and_order() {
        let order_id = OrderId::new();
        let movement = StockMovement::new(StockKey::product(ProductId::new()), 5, "order receipt", order_id);
        assert_eq!(movement.delta, 5);
        assert_eq!(movement.reason, "order receipt");
        assert_eq!(movement.order_id, order_id);
    }
}
