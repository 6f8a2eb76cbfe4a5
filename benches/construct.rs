use compressed_static_function::{Builder, FilterConfig};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn workload(count: usize) -> (Vec<Vec<u8>>, Vec<u32>) {
    let keys = (0..count).map(|i| format!("key{i}").into_bytes()).collect();
    // Mildly skewed values so the code and the pre-filter both do real work.
    let values = (0..count as u32).map(|i| if i % 8 == 0 { i % 100 } else { 0 }).collect();
    (keys, values)
}

fn bench_build(c: &mut Criterion) {
    let (keys, values) = workload(20_000);
    c.bench_function("build_20k", |b| {
        b.iter(|| Builder::new().build(black_box(&keys), black_box(&values)).unwrap())
    });
    c.bench_function("build_20k_binary_fuse", |b| {
        b.iter(|| {
            Builder::new()
                .with_filter(FilterConfig::BinaryFuse {
                    fingerprint_bits: 8,
                })
                .build(black_box(&keys), black_box(&values))
                .unwrap()
        })
    });
}

fn bench_query(c: &mut Criterion) {
    let (keys, values) = workload(20_000);
    let csf = Builder::new().build(&keys, &values).unwrap();
    let mut cursor = 0usize;
    c.bench_function("query", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % keys.len();
            black_box(csf.query(&keys[cursor]))
        })
    });
}

criterion_group!(benches, bench_build, bench_query);
criterion_main!(benches);
