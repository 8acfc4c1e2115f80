//! Benchmark: module lifecycle and dispatch cost
//!
//! Measures the two hot paths of a dynamic store:
//!
//! - acquire/release churn, which recomposes the reducer on every transition
//! - dispatch with a growing number of active modules

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynstore_core::store::{identity_reducer, Action};
use dynstore_core::{create_dynamic_store, create_module, Module, ModuleConfig, StoreConfig};
use serde_json::json;

fn counter(name: &str) -> Module {
    create_module(
        ModuleConfig::new(name)
            .initial_state(json!({ "value": 0 }))
            .reducer("increment", |state, _action| {
                state["value"] = json!(state["value"].as_i64().unwrap_or(0) + 1);
            }),
    )
    .unwrap()
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    let store = create_dynamic_store(StoreConfig::new(identity_reducer())).unwrap();
    let module = counter("churn");
    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            store.acquire(black_box(&module));
            store.release(black_box(&module)).unwrap();
        });
    });

    // shared acquire only bumps the count
    let _held = store.bind(&module);
    group.bench_function("acquire_release/shared", |b| {
        b.iter(|| {
            store.acquire(black_box(&module));
            store.release(black_box(&module)).unwrap();
        });
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for active in [1usize, 10, 50] {
        let store = create_dynamic_store(StoreConfig::new(identity_reducer())).unwrap();
        let modules: Vec<Module> = (0..active).map(|i| counter(&format!("m{i}"))).collect();
        let _guards: Vec<_> = modules.iter().map(|m| store.bind(m)).collect();
        let increment = modules[0].actions()["increment"].clone();

        group.bench_with_input(BenchmarkId::new("modules", active), &active, |b, _| {
            b.iter(|| store.dispatch(black_box(increment.empty())));
        });
    }

    let store = create_dynamic_store(StoreConfig::new(identity_reducer())).unwrap();
    group.bench_function("unmatched", |b| {
        b.iter(|| store.dispatch(black_box(Action::bare("noop"))));
    });

    group.finish();
}

criterion_group!(benches, bench_lifecycle, bench_dispatch);
criterion_main!(benches);
