//! Replacer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use corten_storage::buffer::{AccessType, FrameId, LruKReplacer};

fn record_access_benchmark(c: &mut Criterion) {
    c.bench_function("lru_k_record_access_1000", |b| {
        let replacer = LruKReplacer::new(1000, 2);
        b.iter(|| {
            for i in 0..1000 {
                replacer.record_access(FrameId::new(i), AccessType::Unknown);
            }
            black_box(replacer.size())
        })
    });
}

fn evict_benchmark(c: &mut Criterion) {
    c.bench_function("lru_k_evict_cycle_256", |b| {
        let replacer = LruKReplacer::new(256, 2);
        for i in 0..256 {
            replacer.record_access(FrameId::new(i), AccessType::Unknown);
            replacer.record_access(FrameId::new(i), AccessType::Unknown);
            replacer.set_evictable(FrameId::new(i), true);
        }
        b.iter(|| {
            let victim = replacer.evict().unwrap();
            // Re-admit the victim so the pool stays full.
            replacer.record_access(victim, AccessType::Unknown);
            replacer.set_evictable(victim, true);
            black_box(victim)
        })
    });
}

fn churn_benchmark(c: &mut Criterion) {
    c.bench_function("lru_k_pin_unpin_churn_64", |b| {
        let replacer = LruKReplacer::new(64, 2);
        for i in 0..64 {
            replacer.record_access(FrameId::new(i), AccessType::Unknown);
        }
        b.iter(|| {
            for i in 0..64 {
                let fid = FrameId::new(i);
                replacer.record_access(fid, AccessType::Get);
                replacer.set_evictable(fid, true);
                replacer.set_evictable(fid, false);
            }
            black_box(replacer.size())
        })
    });
}

criterion_group!(
    benches,
    record_access_benchmark,
    evict_benchmark,
    churn_benchmark,
);
criterion_main!(benches);
