//! The receiving (reconciliation) engine.
//!
//! Runs inside the transaction opened by
//! [`receive_order`](crate::PurchasingService::receive_order): finalizes
//! received quantities and prices per line, updates the stock ledger,
//! records cost changes in the price history, and migrates every draft
//! entry into the catalog. Any failure aborts the whole transaction, so a
//! partially applied receipt can never be observed.

use chrono::Utc;
use common::{ActorId, Money, OrderId, ProductId};
use store::{
    AttributeSet, CatalogRef, DraftProduct, DraftState, OrderStatus, PriceHistoryEntry, Product,
    ProductStatus, PurchaseOrder, StockKey, StockMovement, StoreTx, Variant, VariantStatus,
};

use crate::error::{PurchasingError, Result};
use crate::order::input::ReceivedLine;
use crate::order::matching::find_exact_variant;

/// Reason recorded on stock movements and price history entries written
/// during receiving.
pub(crate) const RECEIPT_REASON: &str = "order receipt";

/// Counts of catalog entries touched by draft migration.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ReceiptSummary {
    pub variants_created: usize,
    pub variants_reused: usize,
    pub products_created: usize,
    pub products_reused: usize,
}

impl ReceiptSummary {
    /// Number of catalog entries newly created by this receipt.
    pub fn registered_entries(&self) -> usize {
        self.variants_created + self.products_created
    }
}

/// Applies a receipt to an order inside the caller's transaction.
///
/// Mutates `order` in place (status, received quantities, draft states);
/// the caller persists it afterwards with `update_order`.
pub(crate) async fn receive<Tx: StoreTx>(
    tx: &mut Tx,
    order: &mut PurchaseOrder,
    actor: ActorId,
    lines: &[ReceivedLine],
) -> Result<ReceiptSummary> {
    let order_id = order.id;

    order.status = OrderStatus::Completed;
    order.delivered_at = Some(Utc::now());

    for line in lines {
        let item = order
            .line_item_mut(line.line_item_id)
            .ok_or_else(|| PurchasingError::not_found("order line item", line.line_item_id))?;
        item.received_quantity = Some(line.received_quantity);
        if let Some(cost) = line.unit_cost {
            item.unit_cost = cost;
        }
        let catalog_ref = item.catalog_ref;

        let key = resolve_stock_key(tx, catalog_ref).await?;
        if line.received_quantity > 0 {
            let delta = i64::from(line.received_quantity);
            tx.upsert_stock(&key, delta).await?;
            tx.append_movement(&StockMovement::new(key, delta, RECEIPT_REASON, order_id))
                .await?;
        }
        if let Some(cost) = line.unit_cost {
            finalize_cost(tx, catalog_ref, cost, order_id, actor).await?;
        }
    }

    let mut summary = ReceiptSummary::default();

    // Drafts already registered are skipped, so re-running migration can
    // never promote the same draft twice.
    for draft in order
        .draft_variants
        .iter_mut()
        .filter(|d| d.state.is_draft())
    {
        for name in draft.attributes.names() {
            tx.ensure_attribute(draft.product_id, name).await?;
        }
        migrate_combination(
            tx,
            draft.product_id,
            &draft.attributes,
            draft.quantity,
            draft.unit_cost,
            order_id,
            actor,
            &mut summary,
        )
        .await?;
        draft.state = DraftState::Registered;
        tracing::debug!(draft = %draft.id, "draft variant registered");
    }

    for draft in order
        .draft_products
        .iter_mut()
        .filter(|d| d.state.is_draft())
    {
        migrate_draft_product(tx, draft, order_id, actor, &mut summary).await?;
    }

    tracing::info!(
        order = %order_id,
        new_variants = summary.variants_created,
        new_products = summary.products_created,
        "purchase order received"
    );

    Ok(summary)
}

/// Resolves the stock key for a catalog reference. Variant lines derive the
/// owning product by lookup.
async fn resolve_stock_key<Tx: StoreTx>(tx: &mut Tx, catalog_ref: CatalogRef) -> Result<StockKey> {
    match catalog_ref {
        CatalogRef::Product(product_id) => Ok(StockKey::product(product_id)),
        CatalogRef::Variant(variant_id) => {
            let variant = tx
                .fetch_variant(variant_id)
                .await?
                .ok_or_else(|| PurchasingError::not_found("variant", variant_id))?;
            Ok(StockKey::variant(variant.product_id, variant_id))
        }
    }
}

/// Records a finalized unit cost: when it differs from the catalog's current
/// cost, appends exactly one price history entry and updates the stored
/// cost. A cost equal to the current one leaves no trace.
async fn finalize_cost<Tx: StoreTx>(
    tx: &mut Tx,
    catalog_ref: CatalogRef,
    new_cost: Money,
    order_id: OrderId,
    actor: ActorId,
) -> Result<()> {
    let current = match catalog_ref {
        CatalogRef::Product(id) => {
            tx.fetch_product(id)
                .await?
                .ok_or_else(|| PurchasingError::not_found("product", id))?
                .cost
        }
        CatalogRef::Variant(id) => Some(
            tx.fetch_variant(id)
                .await?
                .ok_or_else(|| PurchasingError::not_found("variant", id))?
                .cost,
        ),
    };

    if current == Some(new_cost) {
        return Ok(());
    }

    tx.append_price_history(&PriceHistoryEntry::new(
        catalog_ref,
        current,
        new_cost,
        RECEIPT_REASON,
        order_id,
        actor,
    ))
    .await?;

    match catalog_ref {
        CatalogRef::Product(id) => tx.update_product_cost(id, new_cost).await?,
        CatalogRef::Variant(id) => tx.update_variant_cost(id, new_cost).await?,
    }

    Ok(())
}

/// Migrates one attribute combination: reuses an exactly matching existing
/// variant or creates a new inactive one, then updates stock and appends
/// the movement and price history entries.
#[allow(clippy::too_many_arguments)]
async fn migrate_combination<Tx: StoreTx>(
    tx: &mut Tx,
    product_id: ProductId,
    attributes: &AttributeSet,
    quantity: u32,
    unit_cost: Money,
    order_id: OrderId,
    actor: ActorId,
    summary: &mut ReceiptSummary,
) -> Result<()> {
    let existing = tx.variants_of(product_id).await?;

    let (variant_id, previous_cost) = match find_exact_variant(&existing, attributes) {
        Some(variant) => {
            let (variant_id, previous_cost) = (variant.id, variant.cost);
            tx.update_variant_cost(variant_id, unit_cost).await?;
            summary.variants_reused += 1;
            tracing::debug!(variant = %variant_id, "matched existing catalog variant");
            (variant_id, Some(previous_cost))
        }
        None => {
            let variant = Variant::new(
                product_id,
                unit_cost,
                VariantStatus::Inactive,
                attributes.clone(),
            );
            tx.create_variant(&variant).await?;
            summary.variants_created += 1;
            (variant.id, None)
        }
    };

    let delta = i64::from(quantity);
    if delta > 0 {
        let key = StockKey::variant(product_id, variant_id);
        tx.upsert_stock(&key, delta).await?;
        tx.append_movement(&StockMovement::new(key, delta, RECEIPT_REASON, order_id))
            .await?;
    }

    tx.append_price_history(&PriceHistoryEntry::new(
        CatalogRef::Variant(variant_id),
        previous_cost,
        unit_cost,
        RECEIPT_REASON,
        order_id,
        actor,
    ))
    .await?;

    Ok(())
}

/// Migrates a draft product: resolves or creates the catalog product by
/// name, then migrates its sub-variants (when present) or its product-level
/// stock (when not).
async fn migrate_draft_product<Tx: StoreTx>(
    tx: &mut Tx,
    draft: &mut DraftProduct,
    order_id: OrderId,
    actor: ActorId,
    summary: &mut ReceiptSummary,
) -> Result<()> {
    let has_sub_variants = !draft.sub_variants.is_empty();

    let product_id = match tx.find_product_by_name(&draft.name).await? {
        Some(product) => {
            // The base cost only means something without sub-variants;
            // combination pricing is handled per sub-variant below.
            if !has_sub_variants && product.cost != Some(draft.unit_cost) {
                tx.update_product_cost(product.id, draft.unit_cost).await?;
                tx.append_price_history(&PriceHistoryEntry::new(
                    CatalogRef::Product(product.id),
                    product.cost,
                    draft.unit_cost,
                    RECEIPT_REASON,
                    order_id,
                    actor,
                ))
                .await?;
            }
            summary.products_reused += 1;
            product.id
        }
        None => {
            let cost = (!has_sub_variants).then_some(draft.unit_cost);
            let product = Product::new(draft.name.trim(), cost, ProductStatus::Pending);
            tx.create_product(&product).await?;
            if !has_sub_variants {
                tx.append_price_history(&PriceHistoryEntry::new(
                    CatalogRef::Product(product.id),
                    None,
                    draft.unit_cost,
                    RECEIPT_REASON,
                    order_id,
                    actor,
                ))
                .await?;
            }
            summary.products_created += 1;
            product.id
        }
    };

    if let Some(schema) = &draft.attribute_schema {
        for name in schema {
            tx.ensure_attribute(product_id, name).await?;
        }
    }

    if has_sub_variants {
        // No product-level stock record for a product broken down into
        // sub-variants; stock lives at variant granularity.
        for sub in &draft.sub_variants {
            for name in sub.attributes.names() {
                tx.ensure_attribute(product_id, name).await?;
            }
            migrate_combination(
                tx,
                product_id,
                &sub.attributes,
                sub.quantity,
                sub.unit_cost,
                order_id,
                actor,
                summary,
            )
            .await?;
        }
    } else if draft.quantity > 0 {
        let key = StockKey::product(product_id);
        let delta = i64::from(draft.quantity);
        tx.upsert_stock(&key, delta).await?;
        tx.append_movement(&StockMovement::new(key, delta, RECEIPT_REASON, order_id))
            .await?;
    }

    draft.state = DraftState::Registered;
    tracing::debug!(draft = %draft.id, product = %product_id, "draft product registered");
    Ok(())
}
