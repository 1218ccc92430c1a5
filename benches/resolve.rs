use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use geoalign::{
    DetectorTechnology, ElementHash, ElementRegistry, GeometryContext, Transform, TransformCache,
    TransformFunction,
};

const ELEMENTS: u32 = 4096;

fn make_registry() -> (ElementRegistry, Vec<Arc<TransformCache>>) {
    let mut registry = ElementRegistry::new(DetectorTechnology::Strip);
    let caches = (0..ELEMENTS)
        .map(|h| {
            let nominal = Transform::from_translation(f64::from(h) * 0.1, 0.0, 300.0);
            registry
                .register(TransformCache::new(
                    ElementHash::new(h),
                    DetectorTechnology::Strip,
                    TransformFunction::with_delta(nominal),
                ))
                .unwrap()
        })
        .collect();
    (registry, caches)
}

fn bench_resolve_nominal_warm(c: &mut Criterion) {
    let (_registry, caches) = make_registry();
    for cache in &caches {
        cache.resolve_nominal();
    }
    let ctx = GeometryContext::nominal();

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(u64::from(ELEMENTS)));
    group.bench_function("nominal_warm", |b| {
        b.iter(|| {
            for cache in &caches {
                black_box(cache.resolve(&ctx).unwrap());
            }
        });
    });
    group.finish();
}

fn bench_resolve_aligned(c: &mut Criterion) {
    let (registry, caches) = make_registry();
    let deltas = (0..ELEMENTS).map(|h| (ElementHash::new(h), Transform::from_translation(0.0, 0.0, 0.01)));
    let store = registry.build_store(deltas, None).unwrap();
    let ctx = GeometryContext::nominal().with_store(store);

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(u64::from(ELEMENTS)));
    group.bench_function("aligned", |b| {
        b.iter(|| {
            for cache in &caches {
                black_box(cache.resolve(&ctx).unwrap());
            }
        });
    });
    group.finish();
}

fn bench_alignment_pass(c: &mut Criterion) {
    let (registry, _caches) = make_registry();

    c.bench_function("alignment/build_store", |b| {
        b.iter_batched(
            || (0..ELEMENTS).map(|h| (ElementHash::new(h), Transform::from_translation(0.0, 0.0, 0.01))).collect::<Vec<_>>(),
            |deltas| black_box(registry.build_store(deltas, None).unwrap()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_resolve_nominal_warm,
    bench_resolve_aligned,
    bench_alignment_pass
);
criterion_main!(benches);
