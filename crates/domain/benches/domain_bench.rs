use std::hint::black_box;

use common::{ActorId, Money, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::order::matching::find_exact_variant;
use domain::order::totals::order_total;
use domain::{CreateOrder, NewLineItem, PurchasingService};
use store::{AttributeSet, MemoryStore, Product, ProductStatus, Supplier, Variant, VariantStatus};

fn bench_order_total(c: &mut Criterion) {
    c.bench_function("domain/order_total", |b| {
        b.iter(|| {
            order_total(
                black_box(Money::from_cents(712_345)),
                black_box(12.5),
                black_box(Money::from_cents(499)),
            )
        });
    });
}

fn bench_exact_match(c: &mut Criterion) {
    let product_id = ProductId::new();
    let variants: Vec<Variant> = (0..100)
        .map(|i| {
            Variant::new(
                product_id,
                Money::from_cents(100),
                VariantStatus::Active,
                AttributeSet::new([("Color", format!("c{i}")), ("Size", format!("s{i}"))]),
            )
        })
        .collect();
    let target = AttributeSet::new([("Color", "c99"), ("Size", "s99")]);

    c.bench_function("domain/find_exact_variant_100", |b| {
        b.iter(|| find_exact_variant(black_box(&variants), black_box(&target)));
    });
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let (service, supplier, product) = rt.block_on(async {
        let store = MemoryStore::new();
        let supplier = Supplier::new("Bench Supplier");
        let product = Product::new("Bench Widget", Some(Money::from_cents(500)), ProductStatus::Active);
        store.seed_supplier(supplier.clone()).await;
        store.seed_product(product.clone()).await;
        (PurchasingService::new(store), supplier, product)
    });

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut cmd = CreateOrder::new(supplier.id, ActorId::new());
                cmd.items
                    .push(NewLineItem::product(product.id, 10, Money::from_cents(500)));
                service.create_order(cmd).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_total,
    bench_exact_match,
    bench_create_order
);
criterion_main!(benches);
