use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use smart_ref::{KeyedHolder, SharedRef};
use std::rc::Rc;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_revive_cycle(c: &mut Criterion) {
    c.bench_function("revive_die_cycle", |b| {
        let w = SharedRef::downgrade(&SharedRef::new(0u64));
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let s = SharedRef::revive(black_box(n), &w).unwrap();
            black_box(&s);
        })
    });
}

fn bench_keyed_adopt(c: &mut Criterion) {
    c.bench_function("keyed_holder_adopt_10k", |b| {
        b.iter_batched(
            || Rc::new(KeyedHolder::new(|v: &u64| *v)),
            |holder| {
                let mut live = Vec::with_capacity(10_000);
                for x in lcg(1).take(10_000) {
                    live.push(holder.adopt(x).unwrap());
                }
                black_box((holder, live))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_keyed_revive_hit(c: &mut Criterion) {
    c.bench_function("keyed_holder_revive_dead", |b| {
        let holder = Rc::new(KeyedHolder::new(|v: &u64| *v % 1_000));
        // Weak handles keep every block dead but indexed.
        let _observers: Vec<_> = (0..1_000u64)
            .map(|k| SharedRef::downgrade(&holder.adopt(k).unwrap()))
            .collect();
        let mut keys = lcg(7);
        b.iter(|| {
            let s = holder.revive(keys.next().unwrap()).unwrap();
            black_box(&s);
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_revive_cycle, bench_keyed_adopt, bench_keyed_revive_hit
}
criterion_main!(benches);
