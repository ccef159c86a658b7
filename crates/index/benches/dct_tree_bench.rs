use criterion::{black_box, criterion_group, criterion_main, Criterion};
use media_dedup_common::{Media, MediaType};
use media_dedup_index::{DctTreeIndex, Index, SearchParams};
use std::path::PathBuf;

fn bench_dct_tree_walk(c: &mut Criterion) {
    let mut idx = DctTreeIndex::new();
    let items: Vec<Media> = (0..50_000u32)
        .map(|i| {
            let mut m = Media::new(PathBuf::from(format!("/m{i}")), MediaType::Image);
            m.id = i + 1;
            m.dct_hash = Some(i as u64 * 0x9E3779B97F4A7C15);
            m
        })
        .collect();
    idx.add(&items);

    let mut needle = Media::new(PathBuf::from("/needle"), MediaType::Image);
    needle.dct_hash = Some(12345 * 0x9E3779B97F4A7C15);
    let params = SearchParams { dct_thresh: 5, ..Default::default() };

    c.bench_function("dct_tree_find", |b| {
        b.iter(|| black_box(idx.find(black_box(&needle), black_box(&params))));
    });
}

criterion_group!(benches, bench_dct_tree_walk);
criterion_main!(benches);
