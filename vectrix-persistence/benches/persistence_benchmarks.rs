use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use vectrix_core::{CollectionConfig, Engine, HnswParams, Metric, Vector};
use vectrix_persistence::{AppendOnlyLog, SnapshotStore, SyncPolicy};

fn sample_snapshot(n: usize) -> vectrix_core::Snapshot {
    let mut engine = Engine::new();
    engine.create_database("bench").unwrap();
    engine
        .create_collection(
            "bench",
            CollectionConfig {
                name: "vectors".into(),
                metric: Metric::L2,
                hnsw: HnswParams::default(),
            },
        )
        .unwrap();
    let vectors: Vec<Vector> = (1..=n as u64)
        .map(|i| Vector::new(i, vec![i as f32, (i * 2) as f32]))
        .collect();
    engine.insert("bench", "vectors", &vectors).unwrap();
    engine.capture_state()
}

fn bench_aol_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("aol_append");

    for sync_policy in [SyncPolicy::Always, SyncPolicy::EverySec, SyncPolicy::Never] {
        let label = format!("{sync_policy:?}");
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("append", &label),
            &sync_policy,
            |b, &policy| {
                let dir = TempDir::new().unwrap();
                let mut aol = AppendOnlyLog::open(dir.path().join("aol.bin"), policy).unwrap();
                let mut counter = 0u64;

                b.iter(|| {
                    counter += 1;
                    let record = vectrix_core::AOLRecord::new(
                        counter,
                        Some("bench".into()),
                        Some("vectors".into()),
                        vectrix_core::CommandPayload::Insert {
                            vectors: vec![Vector::new(counter, vec![1.0, 2.0, 3.0])],
                        },
                    );
                    aol.append(&record).expect("append failed");
                });
            },
        );
    }

    group.finish();
}

fn bench_snapshot_save_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_save_load");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("save", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
            let snap = sample_snapshot(size);

            b.iter(|| {
                store.save(&snap).expect("save failed");
            });
        });

        group.bench_with_input(BenchmarkId::new("load", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
            store.save(&sample_snapshot(size)).unwrap();

            b.iter(|| {
                store.load().expect("load failed");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aol_append, bench_snapshot_save_load);
criterion_main!(benches);
