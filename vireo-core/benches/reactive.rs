//! Benchmarks for the reactive core and the template rewriter.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use vireo_core::{opt, Runtime, Store};

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");

    for effects in [1, 10, 100, 1000] {
        let runtime = Runtime::new();
        let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();
        let handles: Vec<_> = (0..effects)
            .map(|_| {
                let s = state.clone();
                runtime.create_effect(move || {
                    black_box(s.get("n"));
                })
            })
            .collect();

        let mut n = 0i64;
        group.bench_with_input(BenchmarkId::new("fan_out", effects), &effects, |b, _| {
            b.iter(|| {
                n += 1;
                state.set("n", n);
                runtime.flush().unwrap()
            })
        });

        for effect in handles {
            effect.dispose();
        }
    }

    // Many writes, one re-run.
    group.bench_function("burst_of_writes", |b| {
        let runtime = Runtime::new();
        let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();
        let s = state.clone();
        let _effect = runtime.create_effect(move || {
            black_box(s.get("n"));
        });

        let mut n = 0i64;
        b.iter(|| {
            for _ in 0..100 {
                n += 1;
                state.set("n", n);
            }
            runtime.flush().unwrap()
        })
    });

    group.finish();
}

fn bench_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("array");

    for size in [10, 100, 1000] {
        let runtime = Runtime::new();
        let items: Vec<i64> = (0..size).collect();
        let list = runtime.wrap(json!(items));
        let list = list.as_array().unwrap().clone();

        group.bench_with_input(BenchmarkId::new("reverse", size), &size, |b, _| {
            b.iter(|| list.reverse())
        });
    }

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    c.bench_function("store/notify_nested_write", |b| {
        let runtime = Runtime::new();
        let store = Store::new(&runtime, json!({ "todos": [{ "done": false }] })).unwrap();
        let _sub = store.subscribe(|state| {
            black_box(state.len());
        });
        let todo = store.state().get("todos").unwrap().as_array().unwrap().get(0).unwrap();
        let todo = todo.as_object().unwrap().clone();

        let mut done = false;
        b.iter(|| {
            done = !done;
            todo.set("done", done);
            runtime.flush().unwrap()
        })
    });
}

fn bench_opt(c: &mut Criterion) {
    let mut group = c.benchmark_group("opt");

    for rows in [1, 10, 100] {
        let body: String = (0..rows)
            .map(|i| format!("<li class=${{cls{i}}} onclick=${{() => this.pick({i})}}>${{items[{i}].name}}</li>"))
            .collect();
        let source = format!("function() {{ return html`<ul>{body}</ul>`; }}");

        group.bench_with_input(BenchmarkId::new("rewrite", rows), &source, |b, source| {
            b.iter(|| opt(black_box(source)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flush, bench_array, bench_store, bench_opt);
criterion_main!(benches);
