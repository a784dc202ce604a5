//! Benchmarks for batch streaming
//!
//! Run with: cargo bench --package batching
//!
//! This will benchmark batch assembly and pointer resolution over a
//! synthetic dataset of 2000 users.

use batching::BatchReader;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dataset::{BuildOptions, DataPaths, RatingDataset, Split};
use std::fmt::Write as _;
use std::fs;
use tempfile::TempDir;

fn build_test_dataset() -> (TempDir, RatingDataset) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    // 2000 users rating 20 of 400 entities keeps the bench quick but the
    // rows realistically sparse
    let mut ratings = String::new();
    for user in 1..=2000u32 {
        for slot in 0..20u32 {
            let entity = (user * 7 + slot * 13) % 400 + 1;
            let rating = 1 + (user + slot) % 5;
            writeln!(ratings, "{}::{}::{}::978300760", user, entity, rating).unwrap();
        }
    }
    let names: String = (1..=400)
        .map(|id| format!("{}::Entity {} (2000)::Drama\n", id, id))
        .collect();

    let ratings_path = dir.path().join("ratings.dat");
    let names_path = dir.path().join("movies.dat");
    fs::write(&ratings_path, ratings).expect("Failed to write ratings");
    fs::write(&names_path, names).expect("Failed to write names");

    let paths = DataPaths::new(dir.path(), false);
    let dataset = RatingDataset::build(paths, &ratings_path, &names_path, BuildOptions::default())
        .expect("Failed to build test dataset");
    (dir, dataset)
}

fn bench_next_batch(c: &mut Criterion) {
    let (_dir, dataset) = build_test_dataset();
    let mut reader = BatchReader::for_split(&dataset, Split::Train, 128);

    c.bench_function("next_batch_128", |b| {
        b.iter(|| {
            let batch = reader.next_batch().expect("Failed to read batch");
            black_box(batch)
        })
    });
}

fn bench_next_batch_with_corruption(c: &mut Criterion) {
    let (_dir, dataset) = build_test_dataset();
    let mut reader = BatchReader::for_split(&dataset, Split::Train, 128)
        .with_corruption(3)
        .with_seed(42);

    c.bench_function("next_batch_128_corrupted", |b| {
        b.iter(|| {
            let batch = reader.next_batch().expect("Failed to read batch");
            black_box(batch)
        })
    });
}

fn bench_resolve_users(c: &mut Criterion) {
    let (_dir, dataset) = build_test_dataset();
    let user_ids: Vec<u32> = (1..=256).collect();

    c.bench_function("resolve_users_256", |b| {
        b.iter(|| {
            let rows = dataset
                .resolve_users(black_box(&user_ids))
                .expect("Failed to resolve users");
            black_box(rows)
        })
    });
}

criterion_group!(
    benches,
    bench_next_batch,
    bench_next_batch_with_corruption,
    bench_resolve_users
);
criterion_main!(benches);
