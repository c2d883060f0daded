use bqpivot::pivot::pivot_query;
use bqpivot::{CategorySet, PivotSpec, Value};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn wide_spec() -> (PivotSpec, CategorySet) {
    let values: Vec<String> = (0..20).map(|i| format!("metric_{}", i)).collect();
    let spec = PivotSpec::new("proj.ds.events", "user_id", "event_type", &values)
        .expect("valid spec");
    let categories = CategorySet::discovered((0..500).map(|i| Value::from(format!("Event {}'s #{}", i, i))))
        .expect("non-empty categories");
    (spec, categories)
}

fn bench_render_wide_pivot(c: &mut Criterion) {
    let (spec, categories) = wide_spec();
    c.bench_function("render_20x500_pivot", |b| {
        b.iter(|| pivot_query(black_box(&spec), black_box(&categories)).expect("render"))
    });
}

fn bench_label_normalization(c: &mut Criterion) {
    c.bench_function("build_500_categories", |b| {
        b.iter(|| {
            CategorySet::discovered(black_box(
                (0..500).map(|i| Value::from(format!("Sign-Up Step {}", i % 50))),
            ))
            .expect("non-empty categories")
        })
    });
}

criterion_group!(benches, bench_render_wide_pivot, bench_label_normalization);
criterion_main!(benches);
