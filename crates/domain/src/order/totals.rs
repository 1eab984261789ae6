//! Order total computation.

use common::Money;
use store::PurchaseOrder;

/// Computes an order total from its item subtotal, discount percentage, and
/// shipping cost.
///
/// The formula is `round(subtotal * (1 - discount/100) + shipping)` with a
/// zero floor; a discount can never push the total negative.
pub fn order_total(items_subtotal: Money, discount_pct: f64, shipping_cost: Money) -> Money {
    let raw = items_subtotal.cents() as f64 * (1.0 - discount_pct / 100.0)
        + shipping_cost.cents() as f64;
    Money::from_cents(raw.round().max(0.0) as i64)
}

/// Recomputes and stores an order's total from its current items and header.
pub fn recompute(order: &mut PurchaseOrder) {
    order.total = order_total(order.items_subtotal(), order.discount_pct, order.shipping_cost);
}

#[cfg(test)]
mod tests {
    use common::{ActorId, ProductId, SupplierId};
    use store::{CatalogRef, LineItem};

    use super::*;

    #[test]
    fn no_discount_no_shipping() {
        let total = order_total(Money::from_cents(5000), 0.0, Money::zero());
        assert_eq!(total.cents(), 5000);
    }

    #[test]
    fn discount_and_shipping_applied() {
        // (50.00 + 21.00) * 0.9 + 2.00 = 65.90
        let total = order_total(Money::from_cents(7100), 10.0, Money::from_cents(200));
        assert_eq!(total.cents(), 6590);
    }

    #[test]
    fn fractional_discount_rounds_to_nearest_cent() {
        // 999 * 0.875 = 874.125 -> 874
        let total = order_total(Money::from_cents(999), 12.5, Money::zero());
        assert_eq!(total.cents(), 874);
    }

    #[test]
    fn total_is_floored_at_zero() {
        let total = order_total(Money::zero(), 100.0, Money::from_cents(-500));
        assert_eq!(total.cents(), 0);
    }

    #[test]
    fn full_discount_leaves_shipping() {
        let total = order_total(Money::from_cents(5000), 100.0, Money::from_cents(300));
        assert_eq!(total.cents(), 300);
    }

    #[test]
    fn recompute_updates_stored_total() {
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

        recompute(&mut order);
        assert_eq!(order.total.cents(), 4700); // 5000 * 0.9 + 200
    }
}
