use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use faultline_context::EntityContext;
use faultline_core::{AttributeSpec, AttributeType, EntityId, EntityKind, attributes};
use faultline_store::InMemoryBackingStore;

fn person_kind() -> Arc<EntityKind> {
    Arc::new(
        EntityKind::new(
            "Person",
            vec![
                AttributeSpec::optional("firstName", AttributeType::Text),
                AttributeSpec::optional("lastName", AttributeType::Text),
            ],
        )
        .unwrap(),
    )
}

fn seeded_store(rows: usize) -> (Arc<InMemoryBackingStore>, Vec<EntityId>) {
    let store = InMemoryBackingStore::arc();
    let ids = (0..rows)
        .map(|i| {
            let id = EntityId::new();
            store.put_row(
                id,
                attributes! { "firstName" => format!("first-{i}"), "lastName" => "Lovelace" },
            );
            id
        })
        .collect();
    (store, ids)
}

/// Registering faults costs no store traffic; this is the identity-map path.
fn bench_fetch_faults(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_faults");

    for count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("fresh_context", count), count, |b, &count| {
            let (store, ids) = seeded_store(count);
            let kind = person_kind();
            b.iter(|| {
                let mut ctx = EntityContext::new(store.clone(), kind.clone());
                for id in &ids {
                    black_box(ctx.fetch(*id));
                }
            });
        });
    }

    group.finish();
}

/// First attribute access of each fault: one row fetch per entity.
fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");

    for count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("first_read", count), count, |b, &count| {
            let (store, ids) = seeded_store(count);
            let kind = person_kind();
            b.iter(|| {
                let mut ctx = EntityContext::new(store.clone(), kind.clone());
                for id in &ids {
                    black_box(ctx.fetch(*id).get("firstName").unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Resident reads after materialization, against invalidate-then-read.
fn bench_resident_vs_invalidated(c: &mut Criterion) {
    let mut group = c.benchmark_group("resident_vs_invalidated");
    let (store, ids) = seeded_store(1);
    let id = ids[0];

    group.bench_function("resident_read", |b| {
        let mut ctx = EntityContext::new(store.clone(), person_kind());
        let entity = ctx.fetch(id);
        entity.get("firstName").unwrap();
        b.iter(|| black_box(entity.get("firstName").unwrap()));
    });

    group.bench_function("invalidate_then_read", |b| {
        let mut ctx = EntityContext::new(store.clone(), person_kind());
        let entity = ctx.fetch(id);
        b.iter(|| {
            ctx.invalidate(id);
            black_box(entity.get("firstName").unwrap())
        });
    });

    group.finish();
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");

    for count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("dirty_entities", count), count, |b, &count| {
            let (store, ids) = seeded_store(count);
            let mut ctx = EntityContext::new(store.clone(), person_kind());
            let entities: Vec<_> = ids.iter().map(|id| ctx.fetch(*id)).collect();
            b.iter(|| {
                for entity in &entities {
                    entity.set("lastName", black_box("King")).unwrap();
                }
                ctx.save().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fetch_faults,
    bench_materialize,
    bench_resident_vs_invalidated,
    bench_save
);
criterion_main!(benches);
