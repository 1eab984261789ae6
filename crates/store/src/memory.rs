//! In-memory store implementation for testing.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, SupplierId, VariantId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    ModificationHistoryEntry, PriceHistoryEntry, Product, PurchaseOrder, Result, StockKey,
    StockMovement, StoreError, Supplier, Variant,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    suppliers: HashMap<SupplierId, Supplier>,
    products: HashMap<ProductId, Product>,
    variants: HashMap<VariantId, Variant>,
    attributes: HashMap<ProductId, BTreeSet<String>>,
    orders: HashMap<OrderId, PurchaseOrder>,
    stock: HashMap<StockKey, i64>,
    movements: Vec<StockMovement>,
    price_history: Vec<PriceHistoryEntry>,
    modification_history: Vec<ModificationHistoryEntry>,
    fail_on_stock_upsert: bool,
    fail_on_modification_history: bool,
}

/// In-memory store implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation. A
/// transaction holds the store lock for its whole lifetime and keeps an undo
/// snapshot, so dropping it without committing restores the prior state;
/// inspect the store only after the transaction finished.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers

    /// Inserts a supplier directly, bypassing any transaction.
    pub async fn seed_supplier(&self, supplier: Supplier) {
        self.state
            .lock()
            .await
            .suppliers
            .insert(supplier.id, supplier);
    }

    /// Inserts a product directly, bypassing any transaction.
    pub async fn seed_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    /// Inserts a variant directly, bypassing any transaction.
    pub async fn seed_variant(&self, variant: Variant) {
        self.state.lock().await.variants.insert(variant.id, variant);
    }

    /// Sets the stock quantity for a key directly.
    pub async fn seed_stock(&self, key: StockKey, quantity: i64) {
        self.state.lock().await.stock.insert(key, quantity);
    }

    // Inspection helpers

    /// Returns the stock quantity for a key, if a record exists.
    pub async fn stock_level(&self, key: &StockKey) -> Option<i64> {
        self.state.lock().await.stock.get(key).copied()
    }

    /// Returns all recorded stock movements.
    pub async fn movements(&self) -> Vec<StockMovement> {
        self.state.lock().await.movements.clone()
    }

    /// Returns all recorded price history entries.
    pub async fn price_history(&self) -> Vec<PriceHistoryEntry> {
        self.state.lock().await.price_history.clone()
    }

    /// Returns all recorded modification history entries.
    pub async fn modification_history(&self) -> Vec<ModificationHistoryEntry> {
        self.state.lock().await.modification_history.clone()
    }

    /// Returns a product by id.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    /// Finds a product by name (case-insensitive, trimmed).
    pub async fn product_by_name(&self, name: &str) -> Option<Product> {
        let state = self.state.lock().await;
        find_product(&state, name)
    }

    /// Returns a variant by id.
    pub async fn variant(&self, id: VariantId) -> Option<Variant> {
        self.state.lock().await.variants.get(&id).cloned()
    }

    /// Returns all variants of a product.
    pub async fn variants_of_product(&self, product_id: ProductId) -> Vec<Variant> {
        let state = self.state.lock().await;
        state
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Returns the attribute names registered for a product.
    pub async fn attribute_names(&self, product_id: ProductId) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .attributes
            .get(&product_id)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns an order by id.
    pub async fn order(&self, id: OrderId) -> Option<PurchaseOrder> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    // Failure injection

    /// Configures stock upserts to fail until unset.
    pub async fn set_fail_on_stock_upsert(&self, fail: bool) {
        self.state.lock().await.fail_on_stock_upsert = fail;
    }

    /// Configures modification history appends to fail until unset.
    pub async fn set_fail_on_modification_history(&self, fail: bool) {
        self.state.lock().await.fail_on_modification_history = fail;
    }
}

fn find_product(state: &MemoryState, name: &str) -> Option<Product> {
    let needle = name.trim();
    state
        .products
        .values()
        .find(|p| p.name.trim().eq_ignore_ascii_case(needle))
        .cloned()
}

fn injected_failure(what: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Io(std::io::Error::other(format!(
        "injected failure: {what}"
    ))))
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let undo = MemoryState::clone(&guard);
        Ok(MemoryTx {
            guard,
            undo: Some(undo),
            committed: false,
        })
    }
}

/// A transaction over [`MemoryStore`].
///
/// Holds the store lock; mutations apply in place and are undone from the
/// snapshot if the transaction is dropped without commit.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    undo: Option<MemoryState>,
    committed: bool,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(undo) = self.undo.take() {
                *self.guard = undo;
            }
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }

    async fn insert_order(&mut self, order: &PurchaseOrder) -> Result<()> {
        self.guard.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn fetch_order(&mut self, id: OrderId) -> Result<Option<PurchaseOrder>> {
        Ok(self.guard.orders.get(&id).cloned())
    }

    async fn update_order(&mut self, order: &PurchaseOrder) -> Result<()> {
        self.guard.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn fetch_supplier(&mut self, id: SupplierId) -> Result<Option<Supplier>> {
        Ok(self.guard.suppliers.get(&id).cloned())
    }

    async fn fetch_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.guard.products.get(&id).cloned())
    }

    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>> {
        Ok(find_product(&self.guard, name))
    }

    async fn create_product(&mut self, product: &Product) -> Result<()> {
        self.guard.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product_cost(&mut self, id: ProductId, cost: Money) -> Result<()> {
        if let Some(product) = self.guard.products.get_mut(&id) {
            product.cost = Some(cost);
        }
        Ok(())
    }

    async fn fetch_variant(&mut self, id: VariantId) -> Result<Option<Variant>> {
        Ok(self.guard.variants.get(&id).cloned())
    }

    async fn variants_of(&mut self, product_id: ProductId) -> Result<Vec<Variant>> {
        Ok(self
            .guard
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn create_variant(&mut self, variant: &Variant) -> Result<()> {
        self.guard.variants.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn update_variant_cost(&mut self, id: VariantId, cost: Money) -> Result<()> {
        if let Some(variant) = self.guard.variants.get_mut(&id) {
            variant.cost = cost;
        }
        Ok(())
    }

    async fn ensure_attribute(&mut self, product_id: ProductId, name: &str) -> Result<()> {
        self.guard
            .attributes
            .entry(product_id)
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    async fn stock_quantity(&mut self, key: &StockKey) -> Result<Option<i64>> {
        Ok(self.guard.stock.get(key).copied())
    }

    async fn upsert_stock(&mut self, key: &StockKey, delta: i64) -> Result<()> {
        if self.guard.fail_on_stock_upsert {
            return Err(injected_failure("stock upsert"));
        }
        *self.guard.stock.entry(*key).or_insert(0) += delta;
        Ok(())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<()> {
        self.guard.movements.push(movement.clone());
        Ok(())
    }

    async fn append_price_history(&mut self, entry: &PriceHistoryEntry) -> Result<()> {
        self.guard.price_history.push(entry.clone());
        Ok(())
    }

    async fn append_modification_history(
        &mut self,
        entry: &ModificationHistoryEntry,
    ) -> Result<()> {
        if self.guard.fail_on_modification_history {
            return Err(injected_failure("modification history append"));
        }
        self.guard.modification_history.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::ActorId;

    use super::*;
    use crate::catalog::{AttributeSet, ProductStatus, VariantStatus};

    #[tokio::test]
    async fn commit_makes_writes_visible() {
        let store = MemoryStore::new();
        let supplier = Supplier::new("Acme");
        let supplier_id = supplier.id;
        store.seed_supplier(supplier).await;

        let order = PurchaseOrder::new(supplier_id, ActorId::new(), 0.0, Money::zero(), None);
        let order_id = order.id;

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.order(order_id).await.is_some());
    }

    #[tokio::test]
    async fn drop_without_commit_rolls_back() {
        let store = MemoryStore::new();
        let order = PurchaseOrder::new(SupplierId::new(), ActorId::new(), 0.0, Money::zero(), None);
        let order_id = order.id;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(&order).await.unwrap();
            // Dropped without commit.
        }

        assert!(store.order(order_id).await.is_none());
    }

    #[tokio::test]
    async fn upsert_stock_inserts_then_increments() {
        let store = MemoryStore::new();
        let key = StockKey::product(ProductId::new());

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.stock_quantity(&key).await.unwrap(), None);
        tx.upsert_stock(&key, 10).await.unwrap();
        tx.upsert_stock(&key, 3).await.unwrap();
        assert_eq!(tx.stock_quantity(&key).await.unwrap(), Some(13));
        tx.commit().await.unwrap();

        assert_eq!(store.stock_level(&key).await, Some(13));
    }

    #[tokio::test]
    async fn ensure_attribute_is_idempotent() {
        let store = MemoryStore::new();
        let product_id = ProductId::new();

        let mut tx = store.begin().await.unwrap();
        tx.ensure_attribute(product_id, "Color").await.unwrap();
        tx.ensure_attribute(product_id, "Color").await.unwrap();
        tx.ensure_attribute(product_id, "Size").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.attribute_names(product_id).await, vec!["Color", "Size"]);
    }

    #[tokio::test]
    async fn find_product_by_name_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .seed_product(Product::new("Blue Widget", None, ProductStatus::Active))
            .await;

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_product_by_name("  blue widget ").await.unwrap();
        assert!(found.is_some());
        let missing = tx.find_product_by_name("green widget").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn variants_of_filters_by_product() {
        let store = MemoryStore::new();
        let product_id = ProductId::new();
        store
            .seed_variant(Variant::new(
                product_id,
                Money::from_cents(100),
                VariantStatus::Active,
                AttributeSet::new([("Color", "Red")]),
            ))
            .await;
        store
            .seed_variant(Variant::new(
                ProductId::new(),
                Money::from_cents(100),
                VariantStatus::Active,
                AttributeSet::new([("Color", "Blue")]),
            ))
            .await;

        let mut tx = store.begin().await.unwrap();
        let variants = tx.variants_of(product_id).await.unwrap();
        assert_eq!(variants.len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_store_error() {
        let store = MemoryStore::new();
        store.set_fail_on_stock_upsert(true).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.upsert_stock(&StockKey::product(ProductId::new()), 1).await;
        assert!(matches!(result, Err(StoreError::Database(_))));
    }
}
