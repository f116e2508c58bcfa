//! Criterion benchmarks for full hard-sphere runs.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use ricochet_bench::{reference_profile, stress_profile};
use ricochet_engine::{RunBudget, Simulation};

/// Benchmark: 10K events on the 1000-sphere reference gas.
fn bench_events_1k(c: &mut Criterion) {
    let mut sim = Simulation::new(reference_profile(42)).unwrap();

    // Warm up: settle the initial lattice before timing.
    sim.set_budget(RunBudget::events(1000));
    sim.run().unwrap();

    c.bench_function("events_10k_on_1k", |b| {
        b.iter(|| {
            let target = sim.event_count() + 10_000;
            sim.set_budget(RunBudget::events(target));
            sim.run().unwrap();
            black_box(sim.system_time());
        });
    });
}

/// Benchmark: 10K events on the 8000-sphere stress gas.
fn bench_events_8k(c: &mut Criterion) {
    let mut sim = Simulation::new(stress_profile(42)).unwrap();
    sim.set_budget(RunBudget::events(1000));
    sim.run().unwrap();

    c.bench_function("events_10k_on_8k", |b| {
        b.iter(|| {
            let target = sim.event_count() + 10_000;
            sim.set_budget(RunBudget::events(target));
            sim.run().unwrap();
            black_box(sim.system_time());
        });
    });
}

/// Benchmark: build the reference gas and run it to t = 1.
fn bench_cold_start_1k(c: &mut Criterion) {
    c.bench_function("cold_start_1k", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(reference_profile(7)).unwrap();
            sim.run_until(1.0).unwrap();
            black_box(sim.metrics());
        });
    });
}

criterion_group!(benches, bench_events_1k, bench_events_8k, bench_cold_start_1k);
criterion_main!(benches);
