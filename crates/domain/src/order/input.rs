//! Input types for the order-management operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{ActorId, DraftId, LineItemId, Money, ProductId, SupplierId, VariantId};
use store::{AttributeSet, DraftSubVariant};

/// A registered catalog line on a new order.
///
/// References a product, a variant, or both; when both are given the variant
/// must belong to the product.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    /// The product being ordered, for product-level lines.
    pub product_id: Option<ProductId>,

    /// The variant being ordered, for variant-level lines.
    pub variant_id: Option<VariantId>,

    /// Quantity ordered.
    pub quantity: u32,

    /// Cost per unit.
    pub unit_cost: Money,
}

impl NewLineItem {
    /// A product-level line.
    pub fn product(product_id: ProductId, quantity: u32, unit_cost: Money) -> Self {
        Self {
            product_id: Some(product_id),
            variant_id: None,
            quantity,
            unit_cost,
        }
    }

    /// A variant-level line.
    pub fn variant(variant_id: VariantId, quantity: u32, unit_cost: Money) -> Self {
        Self {
            product_id: None,
            variant_id: Some(variant_id),
            quantity,
            unit_cost,
        }
    }

    /// A variant-level line that also states the owning product, which is
    /// checked during validation.
    pub fn variant_of(
        product_id: ProductId,
        variant_id: VariantId,
        quantity: u32,
        unit_cost: Money,
    ) -> Self {
        Self {
            product_id: Some(product_id),
            variant_id: Some(variant_id),
            quantity,
            unit_cost,
        }
    }
}

/// A free-text unregistered item in the legacy input shape.
///
/// Superseded by [`NewDraftProduct`] but still accepted; normalized into a
/// draft product before insertion.
#[derive(Debug, Clone)]
pub struct LegacyItem {
    /// Free-text item name.
    pub name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Cost per unit.
    pub unit_cost: Money,
}

impl LegacyItem {
    /// Creates a legacy item.
    pub fn new(name: impl Into<String>, quantity: u32, unit_cost: Money) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_cost,
        }
    }
}

/// A draft variant on a new order: an attribute combination of an existing
/// product that is not yet a catalog variant.
#[derive(Debug, Clone)]
pub struct NewDraftVariant {
    /// The registered product the combination belongs to.
    pub product_id: ProductId,

    /// The attribute combination to register during receiving.
    pub attributes: AttributeSet,

    /// Quantity ordered.
    pub quantity: u32,

    /// Cost per unit.
    pub unit_cost: Money,
}

impl NewDraftVariant {
    /// Creates a draft variant input.
    pub fn new(
        product_id: ProductId,
        attributes: AttributeSet,
        quantity: u32,
        unit_cost: Money,
    ) -> Self {
        Self {
            product_id,
            attributes,
            quantity,
            unit_cost,
        }
    }
}

/// A draft product on a new order: a product that does not exist in the
/// catalog yet, optionally broken down into sub-variants.
#[derive(Debug, Clone)]
pub struct NewDraftProduct {
    /// Free-text product name.
    pub name: String,

    /// Attribute names the product should carry, when known up front.
    pub attribute_schema: Option<Vec<String>>,

    /// Concrete attribute combinations ordered; quantities and costs live
    /// here when non-empty.
    pub sub_variants: Vec<DraftSubVariant>,

    /// Quantity ordered; meaningful only without sub-variants.
    pub quantity: u32,

    /// Cost per unit; meaningful only without sub-variants.
    pub unit_cost: Money,
}

impl NewDraftProduct {
    /// A draft product without sub-variants.
    pub fn new(name: impl Into<String>, quantity: u32, unit_cost: Money) -> Self {
        Self {
            name: name.into(),
            attribute_schema: None,
            sub_variants: Vec::new(),
            quantity,
            unit_cost,
        }
    }

    /// A draft product broken down into sub-variants.
    pub fn with_sub_variants(
        name: impl Into<String>,
        attribute_schema: Option<Vec<String>>,
        sub_variants: Vec<DraftSubVariant>,
    ) -> Self {
        Self {
            name: name.into(),
            attribute_schema,
            sub_variants,
            quantity: 0,
            unit_cost: Money::zero(),
        }
    }
}

/// Input for creating a purchase order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The supplier the order is placed against.
    pub supplier_id: SupplierId,

    /// Who requested the order.
    pub requested_by: ActorId,

    /// Registered catalog lines.
    pub items: Vec<NewLineItem>,

    /// Legacy free-text unregistered items.
    pub legacy_items: Vec<LegacyItem>,

    /// Draft variants of existing products.
    pub draft_variants: Vec<NewDraftVariant>,

    /// Draft products not yet in the catalog.
    pub draft_products: Vec<NewDraftProduct>,

    /// Discount percentage applied to the item subtotal.
    pub discount_pct: f64,

    /// Shipping cost added after the discount.
    pub shipping_cost: Money,

    /// Expected delivery date, when known.
    pub expected_delivery: Option<DateTime<Utc>>,

    /// Caller-supplied total; when present it is stored as-is instead of
    /// being computed from the items.
    pub explicit_total: Option<Money>,
}

impl CreateOrder {
    /// Creates an empty order request for a supplier.
    pub fn new(supplier_id: SupplierId, requested_by: ActorId) -> Self {
        Self {
            supplier_id,
            requested_by,
            items: Vec::new(),
            legacy_items: Vec::new(),
            draft_variants: Vec::new(),
            draft_products: Vec::new(),
            discount_pct: 0.0,
            shipping_cost: Money::zero(),
            expected_delivery: None,
            explicit_total: None,
        }
    }
}

/// A sparse quantity/cost edit applied to a line item or draft entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemEdit {
    /// New quantity, when changing it.
    pub quantity: Option<u32>,

    /// New unit cost, when changing it.
    pub unit_cost: Option<Money>,
}

impl ItemEdit {
    /// An edit changing only the quantity.
    pub fn quantity(quantity: u32) -> Self {
        Self {
            quantity: Some(quantity),
            unit_cost: None,
        }
    }

    /// An edit changing only the unit cost.
    pub fn unit_cost(unit_cost: Money) -> Self {
        Self {
            quantity: None,
            unit_cost: Some(unit_cost),
        }
    }
}

/// A patch applied to a pending order by [`modify_order`].
///
/// [`modify_order`]: crate::PurchasingService::modify_order
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    /// New discount percentage.
    pub discount_pct: Option<f64>,

    /// New shipping cost.
    pub shipping_cost: Option<Money>,

    /// New expected delivery date.
    pub expected_delivery: Option<DateTime<Utc>>,

    /// Reason recorded in the modification history.
    pub reason: Option<String>,

    /// Per-line-item edits.
    pub line_item_edits: HashMap<LineItemId, ItemEdit>,

    /// Per-draft-variant edits.
    pub draft_variant_edits: HashMap<DraftId, ItemEdit>,

    /// Per-draft-product edits (base quantity/cost).
    pub draft_product_edits: HashMap<DraftId, ItemEdit>,

    /// Line items to delete.
    pub remove_line_items: Vec<LineItemId>,

    /// Draft variants to delete.
    pub remove_draft_variants: Vec<DraftId>,

    /// Draft products to delete.
    pub remove_draft_products: Vec<DraftId>,
}

/// One received line passed to [`receive_order`].
///
/// [`receive_order`]: crate::PurchasingService::receive_order
#[derive(Debug, Clone, Copy)]
pub struct ReceivedLine {
    /// The line item being received.
    pub line_item_id: LineItemId,

    /// Quantity actually delivered.
    pub received_quantity: u32,

    /// Finalized cost per unit, when the supplier invoice differs from the
    /// ordered price.
    pub unit_cost: Option<Money>,
}

impl ReceivedLine {
    /// A received line keeping the ordered unit cost.
    pub fn new(line_item_id: LineItemId, received_quantity: u32) -> Self {
        Self {
            line_item_id,
            received_quantity,
            unit_cost: None,
        }
    }

    /// Sets the finalized unit cost.
    pub fn with_cost(mut self, unit_cost: Money) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }
}
