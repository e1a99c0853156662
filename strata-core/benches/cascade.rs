//! Benchmarks for write propagation.
//!
//! Measures the cost of a field write that fans out to computed properties,
//! and of structural array operations on an observed array.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_core::{observe, Array, Object, Value};

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// `{ source, d0 .. dN }` where every `d` reads `source`.
fn fan_out(width: usize) -> Object {
    let mut plain = Object::new().with("source", 0);
    for i in 0..width {
        plain = plain.with(
            format!("d{i}"),
            Value::computed(move |this| Ok(Value::from(number(&this.get("source")) + i as f64))),
        );
    }
    observe(Value::from(plain)).expect("plain object")
}

/// `{ c0, c1 .. cN }` where each `c` reads the previous one.
fn chain(depth: usize) -> Object {
    let mut plain = Object::new().with("c0", 0);
    for i in 1..=depth {
        let prev = format!("c{}", i - 1);
        plain = plain.with(
            format!("c{i}"),
            Value::computed(move |this| Ok(Value::from(number(&this.get(&prev)) + 1.0))),
        );
    }
    observe(Value::from(plain)).expect("plain object")
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for width in [1, 10, 100] {
        let state = fan_out(width);
        let mut next = 0;
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                next += 1;
                state.set("source", black_box(next)).expect("enabled");
            })
        });
    }
    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    for depth in [1, 10, 50] {
        let state = chain(depth);
        let mut next = 0;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                next += 1;
                state.set("c0", black_box(next)).expect("enabled");
            })
        });
    }
    group.finish();
}

fn bench_array_push(c: &mut Criterion) {
    c.bench_function("array_push_pop", |b| {
        let state = observe(Value::from(Object::new().with("items", Array::new())))
            .expect("plain object");
        let items = state.get("items");
        let items = items.as_array().expect("array field").clone();
        b.iter(|| {
            items.push([Value::from(black_box(1))]).expect("enabled");
            items.pop().expect("enabled");
        })
    });
}

criterion_group!(benches, bench_fan_out, bench_chain, bench_array_push);
criterion_main!(benches);
