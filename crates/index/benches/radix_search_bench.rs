use criterion::{black_box, criterion_group, criterion_main, Criterion};
use media_dedup_index::RadixMap;

fn bench_radix_search(c: &mut Criterion) {
    let mut map = RadixMap::new(12);
    for i in 0..200_000u64 {
        map.insert(i.wrapping_mul(0x9E3779B97F4A7C15), i as u32, (i % 4096) as u32);
    }
    c.bench_function("radix_map_search_bucket", |b| {
        b.iter(|| black_box(map.search(black_box(0xABCDEF0123456789), black_box(6))));
    });
}

criterion_group!(benches, bench_radix_search);
criterion_main!(benches);
