use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use serde_json::{json, Value};
use veml_runtime::{assign_and_flatten, detect_version, migrate_to_canonical, SchemaVersion};

/// A 1.0 document with `fan_out` rooms, each holding `fan_out` meshes.
fn legacy_document(fan_out: usize) -> Vec<u8> {
    let rooms: Vec<Value> = (0..fan_out)
        .map(|room| {
            let meshes: Vec<Value> = (0..fan_out)
                .map(|item| {
                    json!({
                        "type": "meshentity",
                        "tag": format!("item-{room}-{item}"),
                        "mesh-name": "Item",
                        "mesh-resource": "item.glb",
                        "transform": {"type": "scaletransform"}
                    })
                })
                .collect();
            json!({
                "type": "entity",
                "tag": format!("room-{room}"),
                "transform": {"type": "scaletransform"},
                "children": meshes
            })
        })
        .collect();
    let document = json!({
        "xmlns": SchemaVersion::V1_0.namespace(),
        "metadata": {"title": "bench"},
        "environment": {"background": {"color": "black"}, "entity": rooms}
    });
    serde_json::to_vec(&document).unwrap_or_default()
}

fn bench_migrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("migrate");
    for fan_out in [4usize, 16, 64] {
        let bytes = legacy_document(fan_out);
        group.bench_with_input(BenchmarkId::new("v1_0", fan_out), &bytes, |b, bytes| {
            b.iter_batched(
                || detect_version(bytes).expect("bench document detects"),
                |document| migrate_to_canonical(document).expect("bench document migrates"),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");
    for fan_out in [4usize, 16, 64] {
        let document = detect_version(&legacy_document(fan_out))
            .and_then(|document| Ok(migrate_to_canonical(document)?))
            .expect("bench document loads")
            .document;
        group.bench_with_input(
            BenchmarkId::new("rooms", fan_out),
            &document.environment.entities,
            |b, entities| {
                b.iter_batched(
                    || entities.clone(),
                    |mut entities| assign_and_flatten(&mut entities).expect("flatten succeeds"),
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group!(pipeline_benches, bench_migrate, bench_flatten);
criterion_main!(pipeline_benches);
