//! The transactional store abstraction consumed by the domain services.
//!
//! Every service operation runs against a single [`StoreTx`]: begin, perform
//! reads and writes, then commit. Dropping a transaction without committing
//! rolls back everything it did, which is how all-or-nothing failure
//! semantics are achieved for multi-step operations like receiving.

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, SupplierId, VariantId};

use crate::{
    ModificationHistoryEntry, PriceHistoryEntry, Product, PurchaseOrder, Result, StockKey,
    StockMovement, Supplier, Variant,
};

/// A handle capable of opening transactions.
///
/// Implementations must be thread-safe; concurrent transactions on
/// independent data are allowed to proceed in parallel.
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type produced by [`Store::begin`].
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// Operations available inside one transaction.
///
/// Writes become visible to other transactions only after [`StoreTx::commit`].
#[async_trait]
pub trait StoreTx: Send {
    /// Commits the transaction, making all of its writes durable.
    async fn commit(self) -> Result<()>;

    // Orders

    /// Inserts a new order with all of its child rows.
    async fn insert_order(&mut self, order: &PurchaseOrder) -> Result<()>;

    /// Fetches an order with all of its child rows.
    async fn fetch_order(&mut self, id: OrderId) -> Result<Option<PurchaseOrder>>;

    /// Persists the current state of an order, replacing its child rows.
    async fn update_order(&mut self, order: &PurchaseOrder) -> Result<()>;

    // Suppliers

    /// Fetches a supplier by id.
    async fn fetch_supplier(&mut self, id: SupplierId) -> Result<Option<Supplier>>;

    // Catalog

    /// Fetches a product by id.
    async fn fetch_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Finds a product by name, compared case-insensitively after trimming
    /// whitespace.
    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>>;

    /// Inserts a new product.
    async fn create_product(&mut self, product: &Product) -> Result<()>;

    /// Updates a product's stored cost price.
    async fn update_product_cost(&mut self, id: ProductId, cost: Money) -> Result<()>;

    /// Fetches a variant by id, including its attribute values.
    async fn fetch_variant(&mut self, id: VariantId) -> Result<Option<Variant>>;

    /// Lists all variants of a product, including their attribute values.
    async fn variants_of(&mut self, product_id: ProductId) -> Result<Vec<Variant>>;

    /// Inserts a new variant with its attribute values.
    async fn create_variant(&mut self, variant: &Variant) -> Result<()>;

    /// Updates a variant's stored cost price.
    async fn update_variant_cost(&mut self, id: VariantId, cost: Money) -> Result<()>;

    /// Ensures a named attribute exists for a product, creating it if
    /// missing. Idempotent.
    async fn ensure_attribute(&mut self, product_id: ProductId, name: &str) -> Result<()>;

    // Stock ledger

    /// Reads the quantity on hand for a stock key.
    async fn stock_quantity(&mut self, key: &StockKey) -> Result<Option<i64>>;

    /// Adds `delta` to the stock record for `key`, inserting the record if
    /// it does not exist yet.
    async fn upsert_stock(&mut self, key: &StockKey, delta: i64) -> Result<()>;

    /// Appends a stock movement record.
    async fn append_movement(&mut self, movement: &StockMovement) -> Result<()>;

    // Audit ledgers

    /// Appends a price history entry.
    async fn append_price_history(&mut self, entry: &PriceHistoryEntry) -> Result<()>;

    /// Appends an order modification history entry.
    async fn append_modification_history(
        &mut self,
        entry: &ModificationHistoryEntry,
    ) -> Result<()>;
}
