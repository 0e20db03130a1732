use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vectrix_core::{HnswIndex, HnswParams, Metric};

fn random_vector(dim: usize, seed: u64) -> Vec<f32> {
    let mut x = seed.wrapping_mul(2654435761).max(1);
    (0..dim)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x % 1000) as f32 / 1000.0
        })
        .collect()
}

fn build_index(n: usize, dim: usize) -> HnswIndex {
    let mut index = HnswIndex::new(
        Metric::L2,
        HnswParams {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            max_layers: 16,
            seed: 42,
        },
    );
    for i in 1..=n as u64 {
        index
            .insert(i, random_vector(dim, i), vectrix_core::Value::Null)
            .unwrap();
    }
    index
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("hnsw_insert_1000x128", |b| {
        b.iter(|| {
            let index = build_index(1000, 128);
            black_box(index.len());
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let index = build_index(5000, 128);
    let query = random_vector(128, 999_999);
    c.bench_function("hnsw_search_top10_over_5000x128", |b| {
        b.iter(|| black_box(index.search(&query, 10, None)))
    });
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
