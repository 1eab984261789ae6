//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and therefore need a
//! working Docker daemon; they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use common::{ActorId, Money, OrderId};
use sqlx::PgPool;
use store::{
    AttributeSet, CatalogRef, DraftProduct, DraftVariant, LineItem, PriceHistoryEntry, Product,
    ProductStatus, PurchaseOrder, StockKey, Store, StoreTx, Supplier, Variant, VariantStatus,
    postgres::PostgresStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for the schema
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_purchasing_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE suppliers, products, product_attributes, variants, \
         variant_attribute_values, orders, order_line_items, order_draft_variants, \
         order_draft_products, stock_records, stock_movements, price_history, \
         order_modifications CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_supplier(store: &PostgresStore, supplier: &Supplier) {
    sqlx::query("INSERT INTO suppliers (id, name, active) VALUES ($1, $2, $3)")
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(supplier.active)
        .execute(store.pool())
        .await
        .unwrap();
}

async fn seed_product(store: &PostgresStore, product: &Product) {
    sqlx::query("INSERT INTO products (id, name, cost, status) VALUES ($1, $2, $3, $4)")
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.cost.map(|c| c.cents()))
        .bind(product.status.as_str())
        .execute(store.pool())
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn order_roundtrip_with_all_child_collections() {
    let store = get_test_store().await;

    let supplier = Supplier::new("Acme Wholesale");
    seed_supplier(&store, &supplier).await;
    let product = Product::new("Widget", Some(Money::from_cents(500)), ProductStatus::Active);
    seed_product(&store, &product).await;

    let mut order = PurchaseOrder::new(
        supplier.id,
        ActorId::new(),
        10.0,
        Money::from_cents(200),
        None,
    );
    order.line_items.push(LineItem::new(
        CatalogRef::Product(product.id),
        10,
        Money::from_cents(500),
    ));
    order.draft_variants.push(DraftVariant::new(
        product.id,
        AttributeSet::new([("Color", "Red")]),
        3,
        Money::from_cents(700),
    ));
    order.draft_products.push(DraftProduct::new(
        "Gadget",
        Some(vec!["Size".to_string()]),
        vec![],
        2,
        Money::from_cents(150),
    ));
    order.total = Money::from_cents(6590);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.fetch_order(order.id).await.unwrap().unwrap();

    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.supplier_id, order.supplier_id);
    assert_eq!(loaded.status, order.status);
    assert_eq!(loaded.total, order.total);
    assert_eq!(loaded.line_items, order.line_items);
    assert_eq!(loaded.draft_variants, order.draft_variants);
    assert_eq!(loaded.draft_products, order.draft_products);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn fetch_missing_order_returns_none() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.fetch_order(OrderId::new()).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn stock_upsert_inserts_then_increments() {
    let store = get_test_store().await;

    let product = Product::new("Widget", None, ProductStatus::Active);
    seed_product(&store, &product).await;
    let key = StockKey::product(product.id);

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.stock_quantity(&key).await.unwrap(), None);
    tx.upsert_stock(&key, 10).await.unwrap();
    tx.upsert_stock(&key, 3).await.unwrap();
    assert_eq!(tx.stock_quantity(&key).await.unwrap(), Some(13));
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.stock_quantity(&key).await.unwrap(), Some(13));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn dropping_transaction_rolls_back() {
    let store = get_test_store().await;
    let product = Product::new("Ephemeral", None, ProductStatus::Active);

    {
        let mut tx = store.begin().await.unwrap();
        tx.create_product(&product).await.unwrap();
        // Dropped without commit.
    }

    let mut tx = store.begin().await.unwrap();
    assert!(tx.fetch_product(product.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn find_product_by_name_matches_case_insensitively() {
    let store = get_test_store().await;
    let product = Product::new("Blue Widget", None, ProductStatus::Active);
    seed_product(&store, &product).await;

    let mut tx = store.begin().await.unwrap();
    let found = tx.find_product_by_name("  BLUE widget ").await.unwrap();
    assert_eq!(found.map(|p| p.id), Some(product.id));

    let missing = tx.find_product_by_name("green widget").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn variant_attributes_roundtrip() {
    let store = get_test_store().await;
    let product = Product::new("Shirt", None, ProductStatus::Active);
    seed_product(&store, &product).await;

    let attributes = AttributeSet::new([("Color", "Red"), ("Size", "M")]);
    let variant = Variant::new(
        product.id,
        Money::from_cents(900),
        VariantStatus::Inactive,
        attributes.clone(),
    );

    let mut tx = store.begin().await.unwrap();
    tx.create_variant(&variant).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let variants = tx.variants_of(product.id).await.unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].attributes, attributes);

    let fetched = tx.fetch_variant(variant.id).await.unwrap().unwrap();
    assert_eq!(fetched.attributes, attributes);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ensure_attribute_is_idempotent() {
    let store = get_test_store().await;
    let product = Product::new("Shirt", None, ProductStatus::Active);
    seed_product(&store, &product).await;

    let mut tx = store.begin().await.unwrap();
    tx.ensure_attribute(product.id, "Color").await.unwrap();
    tx.ensure_attribute(product.id, "Color").await.unwrap();
    tx.commit().await.unwrap();

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM product_attributes WHERE product_id = $1")
            .bind(product.id.as_uuid())
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn price_history_appends_are_durable() {
    let store = get_test_store().await;
    let product = Product::new("Widget", Some(Money::from_cents(500)), ProductStatus::Active);
    seed_product(&store, &product).await;

    let entry = PriceHistoryEntry::new(
        CatalogRef::Product(product.id),
        Some(Money::from_cents(500)),
        Money::from_cents(550),
        "order receipt",
        OrderId::new(),
        ActorId::new(),
    );

    let mut tx = store.begin().await.unwrap();
    tx.append_price_history(&entry).await.unwrap();
    tx.commit().await.unwrap();

    let (previous, new): (Option<i64>, i64) = sqlx::query_as(
        "SELECT previous_cost, new_cost FROM price_history WHERE product_id = $1",
    )
    .bind(product.id.as_uuid())
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(previous, Some(500));
    assert_eq!(new, 550);
}
