use clipfeed::{
    partition, Catalog, CategoryWeights, Category, ClipDurationPolicy, ClipSelector, MediaHandle,
    VideoAsset,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn library(videos: usize) -> Vec<VideoAsset> {
    (0..videos)
        .map(|i| VideoAsset {
            id: format!("bench_{}", i),
            display_name: format!("video {}", i),
            category: if i % 3 == 0 {
                Category::Relax
            } else {
                Category::Study
            },
            duration_seconds: 3600.0,
            media: MediaHandle::Unbacked,
        })
        .collect()
}

/// Benchmark partitioning a long video under both policies
fn bench_partition(c: &mut Criterion) {
    let fixed = ClipDurationPolicy::Fixed { seconds: 300 };
    let random = ClipDurationPolicy::RandomMinutes {
        min_minutes: 2,
        max_minutes: 10,
    };

    c.bench_function("partition_fixed_2h", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| partition(black_box(7200.0), &fixed, 30, &mut rng))
    });

    c.bench_function("partition_random_2h", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| partition(black_box(7200.0), &random, 30, &mut rng))
    });
}

/// Benchmark weighted selection over a realistic catalog
fn bench_selection(c: &mut Criterion) {
    let videos = library(50);
    let mut rng = StdRng::seed_from_u64(2);
    let catalog = Catalog::build(
        &videos,
        &ClipDurationPolicy::Fixed { seconds: 300 },
        30,
        &mut rng,
    );
    let selector = ClipSelector::new(CategoryWeights::default());

    // Mark a third of the catalog memorized to exercise filtering
    let memorized: HashSet<_> = catalog
        .entries()
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 == 0)
        .map(|(_, e)| e.key())
        .collect();

    c.bench_function("select_next", |b| {
        let mut rng = StdRng::seed_from_u64(3);
        b.iter(|| selector.select_next(black_box(&catalog), &memorized, &mut rng))
    });
}

criterion_group!(benches, bench_partition, bench_selection);
criterion_main!(benches);
