//! PostgreSQL-backed store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ActorId, DraftId, LineItemId, Money, OrderId, ProductId, SupplierId, VariantId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AttributeSet, CatalogRef, DraftProduct, DraftState, DraftSubVariant, DraftVariant, LineItem,
    ModificationHistoryEntry, OrderStatus, PriceHistoryEntry, Product, ProductStatus,
    PurchaseOrder, Result, StockKey, StockMovement, StoreError, Supplier, Variant, VariantStatus,
    store::{Store, StoreTx},
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// A transaction over [`PostgresStore`].
///
/// Wraps a sqlx transaction; dropping it without commit rolls back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(
        format!("unrecognized {what}: {value}").into(),
    ))
}

fn row_to_supplier(row: &PgRow) -> Result<Supplier> {
    Ok(Supplier {
        id: SupplierId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        active: row.try_get("active")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    let status: String = row.try_get("status")?;
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        cost: row
            .try_get::<Option<i64>, _>("cost")?
            .map(Money::from_cents),
        status: ProductStatus::parse(&status).ok_or_else(|| corrupt("product status", &status))?,
    })
}

fn row_to_line_item(row: &PgRow) -> Result<LineItem> {
    let product_id: Option<Uuid> = row.try_get("product_id")?;
    let variant_id: Option<Uuid> = row.try_get("variant_id")?;
    let catalog_ref = match (product_id, variant_id) {
        (_, Some(variant_id)) => CatalogRef::Variant(VariantId::from_uuid(variant_id)),
        (Some(product_id), None) => CatalogRef::Product(ProductId::from_uuid(product_id)),
        (None, None) => return Err(corrupt("line item reference", "both ids null")),
    };
    Ok(LineItem {
        id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        catalog_ref,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_cost: Money::from_cents(row.try_get("unit_cost")?),
        received_quantity: row
            .try_get::<Option<i32>, _>("received_quantity")?
            .map(|q| q as u32),
    })
}

fn row_to_draft_variant(row: &PgRow) -> Result<DraftVariant> {
    let state: String = row.try_get("state")?;
    let attributes: serde_json::Value = row.try_get("attributes")?;
    Ok(DraftVariant {
        id: DraftId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        attributes: serde_json::from_value(attributes)?,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_cost: Money::from_cents(row.try_get("unit_cost")?),
        state: DraftState::parse(&state).ok_or_else(|| corrupt("draft state", &state))?,
    })
}

fn row_to_draft_product(row: &PgRow) -> Result<DraftProduct> {
    let state: String = row.try_get("state")?;
    let attribute_schema: Option<serde_json::Value> = row.try_get("attribute_schema")?;
    let sub_variants: serde_json::Value = row.try_get("sub_variants")?;
    Ok(DraftProduct {
        id: DraftId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        attribute_schema: attribute_schema
            .map(serde_json::from_value)
            .transpose()?,
        sub_variants: serde_json::from_value::<Vec<DraftSubVariant>>(sub_variants)?,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_cost: Money::from_cents(row.try_get("unit_cost")?),
        state: DraftState::parse(&state).ok_or_else(|| corrupt("draft state", &state))?,
    })
}

fn catalog_ref_columns(target: CatalogRef) -> (Option<Uuid>, Option<Uuid>) {
    match target {
        CatalogRef::Product(id) => (Some(id.as_uuid()), None),
        CatalogRef::Variant(id) => (None, Some(id.as_uuid())),
    }
}

impl PostgresTx {
    async fn insert_children(&mut self, order: &PurchaseOrder) -> Result<()> {
        for item in &order.line_items {
            let (product_id, variant_id) = match item.catalog_ref {
                CatalogRef::Product(id) => (Some(id.as_uuid()), None),
                CatalogRef::Variant(id) => (None, Some(id.as_uuid())),
            };
            sqlx::query(
                r#"
                INSERT INTO order_line_items
                    (id, order_id, product_id, variant_id, quantity, unit_cost, received_quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(product_id)
            .bind(variant_id)
            .bind(item.quantity as i32)
            .bind(item.unit_cost.cents())
            .bind(item.received_quantity.map(|q| q as i32))
            .execute(&mut *self.tx)
            .await?;
        }

        for draft in &order.draft_variants {
            sqlx::query(
                r#"
                INSERT INTO order_draft_variants
                    (id, order_id, product_id, attributes, quantity, unit_cost, state)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(draft.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(draft.product_id.as_uuid())
            .bind(serde_json::to_value(&draft.attributes)?)
            .bind(draft.quantity as i32)
            .bind(draft.unit_cost.cents())
            .bind(draft.state.as_str())
            .execute(&mut *self.tx)
            .await?;
        }

        for draft in &order.draft_products {
            sqlx::query(
                r#"
                INSERT INTO order_draft_products
                    (id, order_id, name, attribute_schema, sub_variants, quantity, unit_cost, state)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(draft.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(&draft.name)
            .bind(
                draft
                    .attribute_schema
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
            )
            .bind(serde_json::to_value(&draft.sub_variants)?)
            .bind(draft.quantity as i32)
            .bind(draft.unit_cost.cents())
            .bind(draft.state.as_str())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn load_variant_attributes(
        &mut self,
        variant_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<(String, String)>>> {
        let rows = sqlx::query(
            r#"
            SELECT variant_id, name, value
            FROM variant_attribute_values
            WHERE variant_id = ANY($1)
            "#,
        )
        .bind(variant_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_variant: HashMap<Uuid, Vec<(String, String)>> = HashMap::new();
        for row in rows {
            let variant_id: Uuid = row.try_get("variant_id")?;
            let name: String = row.try_get("name")?;
            let value: String = row.try_get("value")?;
            by_variant.entry(variant_id).or_default().push((name, value));
        }
        Ok(by_variant)
    }

    fn assemble_variant(row: &PgRow, pairs: Vec<(String, String)>) -> Result<Variant> {
        let status: String = row.try_get("status")?;
        Ok(Variant {
            id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            cost: Money::from_cents(row.try_get("cost")?),
            status: VariantStatus::parse(&status)
                .ok_or_else(|| corrupt("variant status", &status))?,
            attributes: AttributeSet::new(pairs),
        })
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &PurchaseOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, supplier_id, requested_by, status, created_at, expected_delivery,
                 delivered_at, discount_pct, shipping_cost, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.requested_by.as_uuid())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.expected_delivery)
        .bind(order.delivered_at)
        .bind(order.discount_pct)
        .bind(order.shipping_cost.cents())
        .bind(order.total.cents())
        .execute(&mut *self.tx)
        .await?;

        self.insert_children(order).await
    }

    async fn fetch_order(&mut self, id: OrderId) -> Result<Option<PurchaseOrder>> {
        let row = sqlx::query(
            r#"
            SELECT id, supplier_id, requested_by, status, created_at, expected_delivery,
                   delivered_at, discount_pct, shipping_cost, total
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let mut order = PurchaseOrder {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            supplier_id: SupplierId::from_uuid(row.try_get::<Uuid, _>("supplier_id")?),
            requested_by: ActorId::from_uuid(row.try_get::<Uuid, _>("requested_by")?),
            status: OrderStatus::parse(&status).ok_or_else(|| corrupt("order status", &status))?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            expected_delivery: row.try_get("expected_delivery")?,
            delivered_at: row.try_get("delivered_at")?,
            discount_pct: row.try_get("discount_pct")?,
            shipping_cost: Money::from_cents(row.try_get("shipping_cost")?),
            total: Money::from_cents(row.try_get("total")?),
            line_items: Vec::new(),
            draft_variants: Vec::new(),
            draft_products: Vec::new(),
        };

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, variant_id, quantity, unit_cost, received_quantity
            FROM order_line_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        order.line_items = rows
            .iter()
            .map(row_to_line_item)
            .collect::<Result<Vec<_>>>()?;

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, attributes, quantity, unit_cost, state
            FROM order_draft_variants
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        order.draft_variants = rows
            .iter()
            .map(row_to_draft_variant)
            .collect::<Result<Vec<_>>>()?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, attribute_schema, sub_variants, quantity, unit_cost, state
            FROM order_draft_products
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        order.draft_products = rows
            .iter()
            .map(row_to_draft_product)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(order))
    }

    async fn update_order(&mut self, order: &PurchaseOrder) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, expected_delivery = $3, delivered_at = $4,
                discount_pct = $5, shipping_cost = $6, total = $7
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.expected_delivery)
        .bind(order.delivered_at)
        .bind(order.discount_pct)
        .bind(order.shipping_cost.cents())
        .bind(order.total.cents())
        .execute(&mut *self.tx)
        .await?;

        // Child rows are rewritten wholesale; edits can touch any of them.
        for table in [
            "order_line_items",
            "order_draft_variants",
            "order_draft_products",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE order_id = $1"))
                .bind(order.id.as_uuid())
                .execute(&mut *self.tx)
                .await?;
        }

        self.insert_children(order).await
    }

    async fn fetch_supplier(&mut self, id: SupplierId) -> Result<Option<Supplier>> {
        let row = sqlx::query("SELECT id, name, active FROM suppliers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_supplier).transpose()
    }

    async fn fetch_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, cost, status FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, cost, status
            FROM products
            WHERE LOWER(TRIM(name)) = LOWER($1)
            LIMIT 1
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn create_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, cost, status) VALUES ($1, $2, $3, $4)")
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(product.cost.map(|c| c.cents()))
            .bind(product.status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_product_cost(&mut self, id: ProductId, cost: Money) -> Result<()> {
        sqlx::query("UPDATE products SET cost = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(cost.cents())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn fetch_variant(&mut self, id: VariantId) -> Result<Option<Variant>> {
        let row = sqlx::query("SELECT id, product_id, cost, status FROM variants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut attributes = self.load_variant_attributes(vec![id.as_uuid()]).await?;
        let pairs = attributes.remove(&id.as_uuid()).unwrap_or_default();
        Ok(Some(Self::assemble_variant(&row, pairs)?))
    }

    async fn variants_of(&mut self, product_id: ProductId) -> Result<Vec<Variant>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, cost, status
            FROM variants
            WHERE product_id = $1
            ORDER BY id
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut attributes = self.load_variant_attributes(ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                let pairs = attributes.remove(&id).unwrap_or_default();
                Self::assemble_variant(row, pairs)
            })
            .collect()
    }

    async fn create_variant(&mut self, variant: &Variant) -> Result<()> {
        sqlx::query("INSERT INTO variants (id, product_id, cost, status) VALUES ($1, $2, $3, $4)")
            .bind(variant.id.as_uuid())
            .bind(variant.product_id.as_uuid())
            .bind(variant.cost.cents())
            .bind(variant.status.as_str())
            .execute(&mut *self.tx)
            .await?;

        for attr in variant.attributes.iter() {
            sqlx::query(
                "INSERT INTO variant_attribute_values (variant_id, name, value) VALUES ($1, $2, $3)",
            )
            .bind(variant.id.as_uuid())
            .bind(&attr.name)
            .bind(&attr.value)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn update_variant_cost(&mut self, id: VariantId, cost: Money) -> Result<()> {
        sqlx::query("UPDATE variants SET cost = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(cost.cents())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn ensure_attribute(&mut self, product_id: ProductId, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_attributes (product_id, name)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(name)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn stock_quantity(&mut self, key: &StockKey) -> Result<Option<i64>> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM stock_records
            WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.variant_id.map(|v| v.as_uuid()))
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(quantity)
    }

    async fn upsert_stock(&mut self, key: &StockKey, delta: i64) -> Result<()> {
        // Insert-or-increment: the common case is that no record exists yet
        // for a freshly registered product or variant.
        let updated = sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = quantity + $3
            WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.variant_id.map(|v| v.as_uuid()))
        .bind(delta)
        .execute(&mut *self.tx)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::debug!(%key, delta, "creating stock record");
            sqlx::query(
                "INSERT INTO stock_records (product_id, variant_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(key.product_id.as_uuid())
            .bind(key.variant_id.map(|v| v.as_uuid()))
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, product_id, variant_id, delta, reason, order_id, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.key.product_id.as_uuid())
        .bind(movement.key.variant_id.map(|v| v.as_uuid()))
        .bind(movement.delta)
        .bind(&movement.reason)
        .bind(movement.order_id.as_uuid())
        .bind(movement.occurred_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_price_history(&mut self, entry: &PriceHistoryEntry) -> Result<()> {
        let (product_id, variant_id) = catalog_ref_columns(entry.target);
        sqlx::query(
            r#"
            INSERT INTO price_history
                (id, product_id, variant_id, previous_cost, new_cost, reason,
                 order_id, changed_by, note, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(product_id)
        .bind(variant_id)
        .bind(entry.previous_cost.map(|c| c.cents()))
        .bind(entry.new_cost.cents())
        .bind(&entry.reason)
        .bind(entry.order_id.as_uuid())
        .bind(entry.changed_by.as_uuid())
        .bind(&entry.note)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_modification_history(
        &mut self,
        entry: &ModificationHistoryEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_modifications
                (id, order_id, actor_id, reason, before_snapshot, after_snapshot, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.order_id.as_uuid())
        .bind(entry.actor_id.as_uuid())
        .bind(&entry.reason)
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}
