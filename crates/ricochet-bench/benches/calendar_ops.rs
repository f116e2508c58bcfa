//! Criterion micro-benchmarks for the event calendar.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ricochet_core::{Event, EventType, ParticleId, SourceId};
use ricochet_sched::{CalendarConfig, EventCalendar};

const N: usize = 10_000;

/// A calendar with one cell transition and four pair events per particle.
fn filled_calendar(seed: u64) -> EventCalendar {
    let mut cal = EventCalendar::new(N, &CalendarConfig::default()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for p in 0..N as u32 {
        cal.push(Event::cell_transition(ParticleId(p), rng.random_range(0.0..10.0)))
            .unwrap();
        for _ in 0..4 {
            let q = rng.random_range(0..N as u32);
            if q == p {
                continue;
            }
            let e = Event::interaction(
                ParticleId(p),
                ParticleId(q),
                SourceId(0),
                rng.random_range(0.0..10.0),
                EventType::Core,
            );
            cal.push(e).unwrap();
        }
    }
    cal
}

/// Benchmark: pop the head, stream to it, and re-push a fresh event for
/// the owner, 10K times on a 10K-particle calendar.
fn bench_pop_push_churn(c: &mut Criterion) {
    let mut cal = filled_calendar(1);
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    c.bench_function("calendar_pop_push_10k", |b| {
        b.iter(|| {
            for _ in 0..N {
                let Some(e) = cal.pop() else { break };
                cal.stream(e.dt);
                let p = e.particle().unwrap();
                cal.invalidate(p).unwrap();
                let next = Event::cell_transition(p, rng.random_range(0.0..10.0));
                black_box(cal.push(next).unwrap());
            }
        });
    });
}

/// Benchmark: fill a 10K-particle calendar from empty.
fn bench_fill(c: &mut Criterion) {
    c.bench_function("calendar_fill_10k", |b| {
        b.iter(|| black_box(filled_calendar(3)));
    });
}

/// Benchmark: rescale every stored time, as after a velocity rescale.
fn bench_rescale(c: &mut Criterion) {
    let mut cal = filled_calendar(4);
    c.bench_function("calendar_rescale_10k", |b| {
        b.iter(|| {
            cal.rescale_times(1.0).unwrap();
            black_box(cal.peek());
        });
    });
}

criterion_group!(benches, bench_pop_push_churn, bench_fill, bench_rescale);
criterion_main!(benches);
