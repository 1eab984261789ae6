//! The purchase order aggregate: header, line items, and draft entries.

use chrono::{DateTime, Utc};
use common::{ActorId, DraftId, LineItemId, Money, OrderId, ProductId, SupplierId};
use serde::{Deserialize, Serialize};

use crate::catalog::{AttributeSet, CatalogRef};

/// The state of a purchase order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed
///           └──► Cancelled
/// ```
///
/// Both Completed and Cancelled are terminal; nothing transitions out of
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed and awaits delivery.
    #[default]
    Pending,

    /// Order was received; stock and catalog were updated (terminal).
    Completed,

    /// Order was cancelled before receipt (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order's items and header can still be edited.
    pub fn can_modify(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be received.
    pub fn can_receive(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a draft entry attached to an order.
///
/// Transitions Draft → Registered exactly once, during receiving; never
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DraftState {
    /// Not yet promoted into the catalog.
    #[default]
    Draft,

    /// Promoted into the catalog during receiving.
    Registered,
}

impl DraftState {
    /// Returns true if the entry still awaits migration.
    pub fn is_draft(&self) -> bool {
        matches!(self, DraftState::Draft)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftState::Draft => "draft",
            DraftState::Registered => "registered",
        }
    }

    /// Parses a state from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DraftState::Draft),
            "registered" => Some(DraftState::Registered),
            _ => None,
        }
    }
}

impl std::fmt::Display for DraftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line on an order referencing a registered catalog product or variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique line item identifier.
    pub id: LineItemId,

    /// The catalog entity being ordered.
    pub catalog_ref: CatalogRef,

    /// Quantity ordered.
    pub quantity: u32,

    /// Cost per unit; finalized during receiving when the supplier invoice
    /// differs from the ordered price.
    pub unit_cost: Money,

    /// Quantity actually received. None until receiving.
    pub received_quantity: Option<u32>,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(catalog_ref: CatalogRef, quantity: u32, unit_cost: Money) -> Self {
        Self {
            id: LineItemId::new(),
            catalog_ref,
            quantity,
            unit_cost,
            received_quantity: None,
        }
    }

    /// Returns the line subtotal (ordered quantity × unit cost).
    pub fn subtotal(&self) -> Money {
        self.unit_cost.multiply(self.quantity)
    }
}

/// A not-yet-registered attribute combination of an existing product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVariant {
    /// Unique draft identifier.
    pub id: DraftId,

    /// The registered product the combination belongs to.
    pub product_id: ProductId,

    /// The attribute combination to register.
    pub attributes: AttributeSet,

    /// Quantity ordered.
    pub quantity: u32,

    /// Cost per unit.
    pub unit_cost: Money,

    /// Migration lifecycle state.
    pub state: DraftState,
}

impl DraftVariant {
    /// Creates a new draft variant in `Draft` state.
    pub fn new(
        product_id: ProductId,
        attributes: AttributeSet,
        quantity: u32,
        unit_cost: Money,
    ) -> Self {
        Self {
            id: DraftId::new(),
            product_id,
            attributes,
            quantity,
            unit_cost,
            state: DraftState::Draft,
        }
    }

    /// Returns the draft subtotal (quantity × unit cost).
    pub fn subtotal(&self) -> Money {
        self.unit_cost.multiply(self.quantity)
    }
}

/// An attribute combination nested under a draft product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSubVariant {
    /// The attribute combination to register.
    pub attributes: AttributeSet,

    /// Quantity ordered.
    pub quantity: u32,

    /// Cost per unit.
    pub unit_cost: Money,
}

impl DraftSubVariant {
    /// Creates a new sub-variant.
    pub fn new(attributes: AttributeSet, quantity: u32, unit_cost: Money) -> Self {
        Self {
            attributes,
            quantity,
            unit_cost,
        }
    }

    /// Returns the sub-variant subtotal (quantity × unit cost).
    pub fn subtotal(&self) -> Money {
        self.unit_cost.multiply(self.quantity)
    }
}

/// A product that does not yet exist in the catalog, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftProduct {
    /// Unique draft identifier.
    pub id: DraftId,

    /// Free-text product name; matched case-insensitively against the
    /// catalog during migration.
    pub name: String,

    /// Attribute names the product should carry, when known up front.
    pub attribute_schema: Option<Vec<String>>,

    /// Concrete attribute combinations ordered. When non-empty, quantities
    /// and costs live here and the base quantity/cost are ignored.
    pub sub_variants: Vec<DraftSubVariant>,

    /// Quantity ordered; meaningful only without sub-variants.
    pub quantity: u32,

    /// Cost per unit; meaningful only without sub-variants.
    pub unit_cost: Money,

    /// Migration lifecycle state.
    pub state: DraftState,
}

impl DraftProduct {
    /// Creates a new draft product in `Draft` state.
    pub fn new(
        name: impl Into<String>,
        attribute_schema: Option<Vec<String>>,
        sub_variants: Vec<DraftSubVariant>,
        quantity: u32,
        unit_cost: Money,
    ) -> Self {
        Self {
            id: DraftId::new(),
            name: name.into(),
            attribute_schema,
            sub_variants,
            quantity,
            unit_cost,
            state: DraftState::Draft,
        }
    }

    /// Returns the draft subtotal: the sum of sub-variant subtotals, or the
    /// base quantity × cost when there are none.
    pub fn subtotal(&self) -> Money {
        if self.sub_variants.is_empty() {
            self.unit_cost.multiply(self.quantity)
        } else {
            self.sub_variants.iter().map(DraftSubVariant::subtotal).sum()
        }
    }
}

/// A replenishment purchase order.
///
/// Owned exclusively by the order-management services: creation inserts it,
/// modification edits it while pending, receiving completes it, and
/// cancellation cancels it. Nothing else writes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Unique order identifier.
    pub id: OrderId,

    /// The supplier the order is placed against.
    pub supplier_id: SupplierId,

    /// Who requested the order.
    pub requested_by: ActorId,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// Expected delivery date, when known.
    pub expected_delivery: Option<DateTime<Utc>>,

    /// Actual delivery date, set during receiving.
    pub delivered_at: Option<DateTime<Utc>>,

    /// Discount percentage applied to the item subtotal.
    pub discount_pct: f64,

    /// Shipping cost added after the discount.
    pub shipping_cost: Money,

    /// Stored order total; always recomputed, never drifted.
    pub total: Money,

    /// Lines referencing registered catalog entities.
    pub line_items: Vec<LineItem>,

    /// Draft attribute combinations of existing products.
    pub draft_variants: Vec<DraftVariant>,

    /// Draft products not yet in the catalog.
    pub draft_products: Vec<DraftProduct>,
}

impl PurchaseOrder {
    /// Creates an empty pending order.
    pub fn new(
        supplier_id: SupplierId,
        requested_by: ActorId,
        discount_pct: f64,
        shipping_cost: Money,
        expected_delivery: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            supplier_id,
            requested_by,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            expected_delivery,
            delivered_at: None,
            discount_pct,
            shipping_cost,
            total: Money::zero(),
            line_items: Vec::new(),
            draft_variants: Vec::new(),
            draft_products: Vec::new(),
        }
    }

    /// Sums the subtotals of all item sources: registered lines, draft
    /// variants, and draft products.
    pub fn items_subtotal(&self) -> Money {
        let lines: Money = self.line_items.iter().map(LineItem::subtotal).sum();
        let drafts: Money = self.draft_variants.iter().map(DraftVariant::subtotal).sum();
        let products: Money = self.draft_products.iter().map(DraftProduct::subtotal).sum();
        lines + drafts + products
    }

    /// Returns a line item by id.
    pub fn line_item(&self, id: LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id == id)
    }

    /// Returns a mutable line item by id.
    pub fn line_item_mut(&mut self, id: LineItemId) -> Option<&mut LineItem> {
        self.line_items.iter_mut().find(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use common::VariantId;

    use super::*;

    #[test]
    fn status_transitions_allowed_only_from_pending() {
        assert!(OrderStatus::Pending.can_modify());
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Pending.can_receive());

        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(!terminal.can_modify());
            assert!(!terminal.can_cancel());
            assert!(!terminal.can_receive());
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn status_parse_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn draft_state_defaults_to_draft() {
        assert!(DraftState::default().is_draft());
        assert!(!DraftState::Registered.is_draft());
    }

    #[test]
    fn line_item_subtotal() {
        let item = LineItem::new(
            CatalogRef::Variant(VariantId::new()),
            10,
            Money::from_cents(500),
        );
        assert_eq!(item.subtotal().cents(), 5000);
        assert!(item.received_quantity.is_none());
    }

    #[test]
    fn draft_product_subtotal_uses_base_without_sub_variants() {
        let draft = DraftProduct::new("Widget", None, vec![], 4, Money::from_cents(250));
        assert_eq!(draft.subtotal().cents(), 1000);
    }

    #[test]
    fn draft_product_subtotal_sums_sub_variants() {
        let draft = DraftProduct::new(
            "Shirt",
            Some(vec!["Size".to_string()]),
            vec![
                DraftSubVariant::new(AttributeSet::new([("Size", "S")]), 2, Money::from_cents(100)),
                DraftSubVariant::new(AttributeSet::new([("Size", "M")]), 3, Money::from_cents(200)),
            ],
            // Base quantity/cost are ignored when sub-variants exist.
            99,
            Money::from_cents(9999),
        );
        assert_eq!(draft.subtotal().cents(), 800);
    }

    #[test]
    fn order_items_subtotal_covers_all_sources() {
        let mut order = PurchaseOrder::new(
            SupplierId::new(),
            ActorId::new(),
            0.0,
            Money::zero(),
            None,
        );
        order.line_items.push(LineItem::new(
            CatalogRef::Product(ProductId::new()),
            10,
            Money::from_cents(500),
        ));
        order.draft_variants.push(DraftVariant::new(
            ProductId::new(),
            AttributeSet::new([("Color", "Red")]),
            3,
            Money::from_cents(700),
        ));
        order.draft_products.push(DraftProduct::new(
            "Widget",
            None,
            vec![],
            2,
            Money::from_cents(150),
        ));
        assert_eq!(order.items_subtotal().cents(), 5000 + 2100 + 300);
    }

    #[test]
    fn line_item_lookup_by_id() {
        let mut order = PurchaseOrder::new(
            SupplierId::new(),
            ActorId::new(),
            0.0,
            Money::zero(),
            None,
        );
        let item = LineItem::new(CatalogRef::Product(ProductId::new()), 1, Money::from_cents(100));
        let id = item.id;
        order.line_items.push(item);

        assert!(order.line_item(id).is_some());
        assert!(order.line_item(LineItemId::new()).is_none());
    }

    #[test]
    fn order_serialization_roundtrip() {
        let mut order = PurchaseOrder::new(
            SupplierId::new(),
            ActorId::new(),
            10.0,
            Money::from_cents(200),
            None,
        );
        order.line_items.push(LineItem::new(
            CatalogRef::Product(ProductId::new()),
            10,
            Money::from_cents(500),
        ));

        let json = serde_json::to_string(&order).unwrap();
        let deserialized: PurchaseOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
