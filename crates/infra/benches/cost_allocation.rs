use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rust_decimal::Decimal;

use plasticflow_costing::{
    allocate_costs, default_tax_components, AllocationItem, AllocationMethod, CostBucket,
    CostComponent, CostScope,
};

fn shipment_items(count: usize) -> Vec<AllocationItem> {
    (0..count)
        .map(|i| AllocationItem {
            item_index: i,
            quantity: Decimal::new(20 + (i as i64 % 7), 0),
            base_amount_import: Decimal::new(18_000 + (i as i64 * 350), 0),
        })
        .collect()
}

/// A realistic worksheet: freight and handling plus the full tax table.
fn worksheet_components(extra_locals: usize) -> Vec<CostComponent> {
    let mut components = vec![
        CostComponent {
            name: "ocean freight".to_string(),
            bucket: CostBucket::Foreign,
            scope: CostScope::TotalAmount,
            amount: Decimal::new(4_500, 0),
            percent: None,
            currency: "USD".to_string(),
            exchange_rate: None,
            apply_to_item: None,
        },
        CostComponent {
            name: "port handling".to_string(),
            bucket: CostBucket::Local,
            scope: CostScope::TotalAmount,
            amount: Decimal::new(250_000, 0),
            percent: None,
            currency: "PKR".to_string(),
            exchange_rate: None,
            apply_to_item: None,
        },
    ];
    for i in 0..extra_locals {
        components.push(CostComponent {
            name: format!("local charge {i}"),
            bucket: CostBucket::Local,
            scope: CostScope::TotalAmount,
            amount: Decimal::new(10_000 + (i as i64 * 1_000), 0),
            percent: None,
            currency: "PKR".to_string(),
            exchange_rate: None,
            apply_to_item: None,
        });
    }
    components.extend(default_tax_components("PKR"));
    components
}

fn bench_allocation_by_item_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_by_item_count");
    let components = worksheet_components(0);

    for item_count in [1, 10, 50, 200].iter() {
        group.throughput(Throughput::Elements(*item_count as u64));
        let items = shipment_items(*item_count);
        group.bench_with_input(
            BenchmarkId::new("by_quantity", item_count),
            &items,
            |b, items| {
                b.iter(|| {
                    allocate_costs(
                        black_box(items),
                        black_box(&components),
                        AllocationMethod::ByQuantity,
                        "USD",
                        "PKR",
                        Decimal::new(280, 0),
                    )
                    .unwrap()
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("by_value", item_count),
            &items,
            |b, items| {
                b.iter(|| {
                    allocate_costs(
                        black_box(items),
                        black_box(&components),
                        AllocationMethod::ByValue,
                        "USD",
                        "PKR",
                        Decimal::new(280, 0),
                    )
                    .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_allocation_by_component_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_by_component_count");
    let items = shipment_items(25);

    for extra_locals in [0, 10, 50].iter() {
        let components = worksheet_components(*extra_locals);
        group.throughput(Throughput::Elements(components.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("components", components.len()),
            &components,
            |b, components| {
                b.iter(|| {
                    allocate_costs(
                        black_box(&items),
                        black_box(components),
                        AllocationMethod::ByValue,
                        "USD",
                        "PKR",
                        Decimal::new(280, 0),
                    )
                    .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_allocation_by_item_count,
    bench_allocation_by_component_count
);
criterion_main!(benches);
