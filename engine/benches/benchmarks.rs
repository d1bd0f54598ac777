//! Performance benchmarks for ssot-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use ssot_engine::{
    diff_stores, DiffOptions, FieldDef, FieldType, Fields, ModelSchema, NoMemory, Record,
    Schema, Store, SyncOptions, Synchronizer, MemoryAdapter,
};
use std::sync::Arc;

fn create_test_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new()
            .with_top_level(["device"])
            .with_model(
                ModelSchema::new("device")
                    .with_identifier(FieldDef::required("name", FieldType::String))
                    .with_attribute(FieldDef::optional("role", FieldType::String))
                    .with_attribute(FieldDef::optional("serial", FieldType::String))
                    .with_child("interface", "interfaces"),
            )
            .with_model(
                ModelSchema::new("interface")
                    .with_identifier(FieldDef::required("device", FieldType::String))
                    .with_identifier(FieldDef::required("name", FieldType::String))
                    .with_attribute(FieldDef::optional("mtu", FieldType::Int)),
            ),
    )
}

fn fields(value: serde_json::Value) -> Fields {
    value
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// `devices` devices with four interfaces each; every `drift`-th device has a
/// different role and mtu.
fn populated_store(schema: &Arc<Schema>, devices: usize, drift: usize) -> Store {
    let mut store = Store::new(schema.clone());
    for i in 0..devices {
        let name = format!("dev{i:05}");
        let changed = drift > 0 && i % drift == 0;
        let role = if changed { "spine" } else { "leaf" };
        let device = Record::new(
            schema.model("device").unwrap(),
            fields(json!({"name": name})),
            fields(json!({"role": role, "serial": format!("S{i}")})),
        )
        .unwrap();
        store.add(device).unwrap();

        for port in 0..4 {
            let mtu = if changed { 9000 } else { 1500 };
            let interface = Record::new(
                schema.model("interface").unwrap(),
                fields(json!({"device": name, "name": format!("eth{port}")})),
                fields(json!({"mtu": mtu})),
            )
            .unwrap();
            store.add_child("device", &name, interface).unwrap();
        }
    }
    store
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    let schema = create_test_schema();

    for size in [100, 1000, 5000] {
        let source = populated_store(&schema, size, 0);
        let target = populated_store(&schema, size, 10);

        group.bench_with_input(BenchmarkId::new("drifted", size), &size, |b, _| {
            b.iter(|| diff_stores(black_box(&source), black_box(&target), &DiffOptions::new()))
        });

        let empty = Store::new(schema.clone());
        group.bench_with_input(BenchmarkId::new("all_create", size), &size, |b, _| {
            b.iter(|| diff_stores(black_box(&source), black_box(&empty), &DiffOptions::new()))
        });
    }

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let schema = create_test_schema();
    let source = populated_store(&schema, 1000, 0);
    let target = populated_store(&schema, 1000, 3);
    let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();

    c.bench_function("diff_to_json_1000", |b| b.iter(|| black_box(&diff).to_json()));
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let schema = create_test_schema();

    for size in [100, 1000] {
        let source = populated_store(&schema, size, 0);
        let target = populated_store(&schema, size, 5);
        let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();
        let sync = Synchronizer::new(SyncOptions::new()).with_probe(Arc::new(NoMemory));

        group.bench_with_input(BenchmarkId::new("drifted", size), &size, |b, _| {
            b.iter_batched(
                || {
                    let mut adapter = MemoryAdapter::new("target", schema.clone());
                    *ssot_engine::Adapter::store_mut(&mut adapter) = target.clone();
                    adapter
                },
                |mut adapter| runtime.block_on(sync.apply(&diff, &mut adapter)),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff, bench_serialize, bench_apply);
criterion_main!(benches);
