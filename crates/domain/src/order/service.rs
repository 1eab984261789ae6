//! The purchasing service exposing the four order-management operations.

use common::{ActorId, Money, OrderId};
use store::{
    CatalogRef, DraftProduct, DraftVariant, LineItem, ModificationHistoryEntry, PurchaseOrder,
    Store, StoreTx,
};

use crate::error::{PurchasingError, Result, ValidationErrors};
use crate::order::input::{
    CreateOrder, LegacyItem, NewDraftProduct, NewDraftVariant, NewLineItem, OrderPatch,
    ReceivedLine,
};
use crate::order::{receiving, totals};

/// Service for managing purchase orders.
///
/// Every operation opens one transaction on the injected store, performs all
/// of its reads and writes inside it, and commits at the end; any failure
/// drops the transaction and rolls everything back.
pub struct PurchasingService<S: Store> {
    store: S,
}

impl<S: Store> PurchasingService<S> {
    /// Creates a new service on top of a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a purchase order in `pending` status.
    ///
    /// Validates the request shape first and then every referenced entity,
    /// reporting all violations together. Legacy free-text items are
    /// normalized into draft products before insertion. Returns the new
    /// order id.
    #[tracing::instrument(skip(self, cmd), fields(supplier = %cmd.supplier_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderId> {
        let CreateOrder {
            supplier_id,
            requested_by,
            items,
            legacy_items,
            draft_variants,
            mut draft_products,
            discount_pct,
            shipping_cost,
            expected_delivery,
            explicit_total,
        } = cmd;

        normalize_legacy_items(&mut draft_products, legacy_items);

        let mut violations = ValidationErrors::new();
        validate_shape(
            &items,
            &draft_variants,
            &draft_products,
            discount_pct,
            shipping_cost,
            &mut violations,
        );
        violations.into_result()?;

        let mut tx = self.store.begin().await?;

        let supplier = tx
            .fetch_supplier(supplier_id)
            .await?
            .ok_or_else(|| PurchasingError::not_found("supplier", supplier_id))?;

        let mut violations = ValidationErrors::new();
        if !supplier.active {
            violations.push(format!("supplier {supplier_id} is not active"));
        }

        let mut line_items = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if let Some(catalog_ref) = resolve_item_ref(&mut tx, idx, item, &mut violations).await?
            {
                line_items.push(LineItem::new(catalog_ref, item.quantity, item.unit_cost));
            }
        }

        for (idx, draft) in draft_variants.iter().enumerate() {
            if tx.fetch_product(draft.product_id).await?.is_none() {
                violations.push(format!(
                    "draft variant {idx}: product {} not found",
                    draft.product_id
                ));
            }
        }

        violations.into_result()?;

        let mut order = PurchaseOrder::new(
            supplier_id,
            requested_by,
            discount_pct,
            shipping_cost,
            expected_delivery,
        );
        order.line_items = line_items;
        order.draft_variants = draft_variants
            .into_iter()
            .map(|d| DraftVariant::new(d.product_id, d.attributes, d.quantity, d.unit_cost))
            .collect();
        order.draft_products = draft_products
            .into_iter()
            .map(|d| {
                DraftProduct::new(
                    d.name,
                    d.attribute_schema,
                    d.sub_variants,
                    d.quantity,
                    d.unit_cost,
                )
            })
            .collect();
        order.total = match explicit_total {
            Some(total) => total,
            None => totals::order_total(order.items_subtotal(), discount_pct, shipping_cost),
        };

        tx.insert_order(&order).await?;
        tx.commit().await?;

        metrics::counter!("purchase_orders_created_total").increment(1);
        tracing::info!(order = %order.id, total = %order.total, "purchase order created");
        Ok(order.id)
    }

    /// Edits a pending order in place and records one modification history
    /// entry with full before/after snapshots. Returns the recomputed total.
    #[tracing::instrument(skip(self, patch))]
    pub async fn modify_order(
        &self,
        order_id: OrderId,
        actor: ActorId,
        patch: OrderPatch,
    ) -> Result<Money> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| PurchasingError::not_found("order", order_id))?;
        if !order.status.can_modify() {
            return Err(PurchasingError::InvalidState {
                status: order.status,
                action: "modify",
            });
        }

        let before = serde_json::to_value(&order)?;
        apply_patch(&mut order, &patch)?;
        totals::recompute(&mut order);

        tx.update_order(&order).await?;
        let reason = patch
            .reason
            .unwrap_or_else(|| "order modified".to_string());
        tx.append_modification_history(&ModificationHistoryEntry::new(
            order_id,
            actor,
            reason,
            before,
            serde_json::to_value(&order)?,
        ))
        .await?;
        tx.commit().await?;

        metrics::counter!("purchase_orders_modified_total").increment(1);
        Ok(order.total)
    }

    /// Cancels a pending order.
    ///
    /// Terminal orders are rejected; nothing was received, so there are no
    /// stock or catalog effects, only the status change and its history
    /// entry.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        actor: ActorId,
        reason: impl Into<String>,
    ) -> Result<()> {
        let reason = reason.into();
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| PurchasingError::not_found("order", order_id))?;
        if !order.status.can_cancel() {
            return Err(PurchasingError::InvalidState {
                status: order.status,
                action: "cancel",
            });
        }

        let before = serde_json::to_value(&order)?;
        order.status = store::OrderStatus::Cancelled;

        tx.update_order(&order).await?;
        tx.append_modification_history(&ModificationHistoryEntry::new(
            order_id,
            actor,
            reason,
            before,
            serde_json::to_value(&order)?,
        ))
        .await?;
        tx.commit().await?;

        metrics::counter!("purchase_orders_cancelled_total").increment(1);
        tracing::info!(order = %order_id, "purchase order cancelled");
        Ok(())
    }

    /// Receives a pending order: finalizes quantities and prices, updates
    /// the stock ledger, promotes drafts into the catalog, and completes the
    /// order. All-or-nothing; any failure rolls the whole receipt back.
    #[tracing::instrument(skip(self, lines))]
    pub async fn receive_order(
        &self,
        order_id: OrderId,
        actor: ActorId,
        lines: Vec<ReceivedLine>,
    ) -> Result<()> {
        let started = std::time::Instant::now();

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| PurchasingError::not_found("order", order_id))?;
        if !order.status.can_receive() {
            return Err(PurchasingError::InvalidState {
                status: order.status,
                action: "receive",
            });
        }

        let before = serde_json::to_value(&order)?;
        let summary = receiving::receive(&mut tx, &mut order, actor, &lines).await?;
        tx.update_order(&order).await?;
        tx.append_modification_history(&ModificationHistoryEntry::new(
            order_id,
            actor,
            format!(
                "order receipt ({} catalog entries registered)",
                summary.registered_entries()
            ),
            before,
            serde_json::to_value(&order)?,
        ))
        .await?;
        tx.commit().await?;

        metrics::histogram!("purchase_order_receiving_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("purchase_orders_received_total").increment(1);
        Ok(())
    }

    /// Loads an order by id. Returns None if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<PurchaseOrder>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.fetch_order(order_id).await?)
    }
}

/// Folds legacy free-text items into the draft product list, de-duplicating
/// by trimmed, case-insensitive name against draft products supplied in the
/// same request (and against earlier legacy items).
fn normalize_legacy_items(draft_products: &mut Vec<NewDraftProduct>, legacy_items: Vec<LegacyItem>) {
    for item in legacy_items {
        let name = item.name.trim();
        let duplicate = draft_products
            .iter()
            .any(|d| d.name.trim().eq_ignore_ascii_case(name));
        if !duplicate {
            draft_products.push(NewDraftProduct::new(name, item.quantity, item.unit_cost));
        }
    }
}

/// Validates everything checkable without the store, collecting all
/// violations.
fn validate_shape(
    items: &[NewLineItem],
    draft_variants: &[NewDraftVariant],
    draft_products: &[NewDraftProduct],
    discount_pct: f64,
    shipping_cost: Money,
    violations: &mut ValidationErrors,
) {
    if !(0.0..=100.0).contains(&discount_pct) {
        violations.push(format!(
            "discount must be between 0 and 100 (got {discount_pct})"
        ));
    }
    if shipping_cost.is_negative() {
        violations.push("shipping cost must not be negative");
    }

    for (idx, item) in items.iter().enumerate() {
        if item.product_id.is_none() && item.variant_id.is_none() {
            violations.push(format!("item {idx}: must reference a product or a variant"));
        }
        if item.quantity == 0 {
            violations.push(format!("item {idx}: quantity must be greater than zero"));
        }
        if !item.unit_cost.is_positive() {
            violations.push(format!("item {idx}: unit cost must be greater than zero"));
        }
    }

    for (idx, draft) in draft_variants.iter().enumerate() {
        if draft.attributes.is_empty() {
            violations.push(format!(
                "draft variant {idx}: attribute set must not be empty"
            ));
        }
        if draft.quantity == 0 {
            violations.push(format!(
                "draft variant {idx}: quantity must be greater than zero"
            ));
        }
        if !draft.unit_cost.is_positive() {
            violations.push(format!(
                "draft variant {idx}: unit cost must be greater than zero"
            ));
        }
    }

    for (idx, draft) in draft_products.iter().enumerate() {
        if draft.name.trim().is_empty() {
            violations.push(format!("draft product {idx}: name must not be empty"));
        }
        if draft.sub_variants.is_empty() {
            if draft.quantity == 0 {
                violations.push(format!(
                    "draft product {idx}: quantity must be greater than zero"
                ));
            }
            if !draft.unit_cost.is_positive() {
                violations.push(format!(
                    "draft product {idx}: unit cost must be greater than zero"
                ));
            }
        } else {
            for (sub_idx, sub) in draft.sub_variants.iter().enumerate() {
                if sub.attributes.is_empty() {
                    violations.push(format!(
                        "draft product {idx} sub-variant {sub_idx}: attribute set must not be empty"
                    ));
                }
                if sub.quantity == 0 {
                    violations.push(format!(
                        "draft product {idx} sub-variant {sub_idx}: quantity must be greater than zero"
                    ));
                }
                if !sub.unit_cost.is_positive() {
                    violations.push(format!(
                        "draft product {idx} sub-variant {sub_idx}: unit cost must be greater than zero"
                    ));
                }
            }
        }
    }
}

/// Resolves a line item's catalog reference, recording a violation instead
/// of returning one when the referenced entity is missing or inconsistent.
async fn resolve_item_ref<Tx: StoreTx>(
    tx: &mut Tx,
    idx: usize,
    item: &NewLineItem,
    violations: &mut ValidationErrors,
) -> Result<Option<CatalogRef>> {
    match (item.product_id, item.variant_id) {
        (stated_product, Some(variant_id)) => match tx.fetch_variant(variant_id).await? {
            None => {
                violations.push(format!("item {idx}: variant {variant_id} not found"));
                Ok(None)
            }
            Some(variant) => {
                if let Some(product_id) = stated_product {
                    if variant.product_id != product_id {
                        violations.push(format!(
                            "item {idx}: variant {variant_id} does not belong to product {product_id}"
                        ));
                        return Ok(None);
                    }
                }
                Ok(Some(CatalogRef::Variant(variant_id)))
            }
        },
        (Some(product_id), None) => {
            if tx.fetch_product(product_id).await?.is_none() {
                violations.push(format!("item {idx}: product {product_id} not found"));
                Ok(None)
            } else {
                Ok(Some(CatalogRef::Product(product_id)))
            }
        }
        // Already rejected by shape validation.
        (None, None) => Ok(None),
    }
}

/// Applies a patch to an order: deletions first, then sparse edits, then
/// header fields. Unknown ids and non-positive values are collected and
/// reported together.
fn apply_patch(order: &mut PurchaseOrder, patch: &OrderPatch) -> Result<()> {
    let mut violations = ValidationErrors::new();

    for id in &patch.remove_line_items {
        let before = order.line_items.len();
        order.line_items.retain(|item| item.id != *id);
        if order.line_items.len() == before {
            violations.push(format!("line item {id} not found on order"));
        }
    }
    for id in &patch.remove_draft_variants {
        let before = order.draft_variants.len();
        order.draft_variants.retain(|draft| draft.id != *id);
        if order.draft_variants.len() == before {
            violations.push(format!("draft variant {id} not found on order"));
        }
    }
    for id in &patch.remove_draft_products {
        let before = order.draft_products.len();
        order.draft_products.retain(|draft| draft.id != *id);
        if order.draft_products.len() == before {
            violations.push(format!("draft product {id} not found on order"));
        }
    }

    for (id, edit) in &patch.line_item_edits {
        match order.line_item_mut(*id) {
            None => violations.push(format!("line item {id} not found on order")),
            Some(item) => {
                if let Some(quantity) = edit.quantity {
                    if quantity == 0 {
                        violations
                            .push(format!("line item {id}: quantity must be greater than zero"));
                    } else {
                        item.quantity = quantity;
                    }
                }
                if let Some(cost) = edit.unit_cost {
                    if !cost.is_positive() {
                        violations
                            .push(format!("line item {id}: unit cost must be greater than zero"));
                    } else {
                        item.unit_cost = cost;
                    }
                }
            }
        }
    }

    for (id, edit) in &patch.draft_variant_edits {
        match order.draft_variants.iter_mut().find(|d| d.id == *id) {
            None => violations.push(format!("draft variant {id} not found on order")),
            Some(draft) => {
                if let Some(quantity) = edit.quantity {
                    if quantity == 0 {
                        violations
                            .push(format!("draft variant {id}: quantity must be greater than zero"));
                    } else {
                        draft.quantity = quantity;
                    }
                }
                if let Some(cost) = edit.unit_cost {
                    if !cost.is_positive() {
                        violations.push(format!(
                            "draft variant {id}: unit cost must be greater than zero"
                        ));
                    } else {
                        draft.unit_cost = cost;
                    }
                }
            }
        }
    }

    for (id, edit) in &patch.draft_product_edits {
        match order.draft_products.iter_mut().find(|d| d.id == *id) {
            None => violations.push(format!("draft product {id} not found on order")),
            Some(draft) => {
                if let Some(quantity) = edit.quantity {
                    if quantity == 0 {
                        violations
                            .push(format!("draft product {id}: quantity must be greater than zero"));
                    } else {
                        draft.quantity = quantity;
                    }
                }
                if let Some(cost) = edit.unit_cost {
                    if !cost.is_positive() {
                        violations.push(format!(
                            "draft product {id}: unit cost must be greater than zero"
                        ));
                    } else {
                        draft.unit_cost = cost;
                    }
                }
            }
        }
    }

    if let Some(discount) = patch.discount_pct {
        if !(0.0..=100.0).contains(&discount) {
            violations.push(format!("discount must be between 0 and 100 (got {discount})"));
        } else {
            order.discount_pct = discount;
        }
    }
    if let Some(shipping) = patch.shipping_cost {
        if shipping.is_negative() {
            violations.push("shipping cost must not be negative");
        } else {
            order.shipping_cost = shipping;
        }
    }
    if let Some(expected) = patch.expected_delivery {
        order.expected_delivery = Some(expected);
    }

    violations.into_result()
}
