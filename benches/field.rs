//! Criterion benchmarks for the taufield engine.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use taufield::clock::SimulationClock;
use taufield::grid::{laplacian, Field, Grid};
use taufield::observer::NullSink;
use taufield::params::{SimConfig, TauCoupling};
use taufield::prng::Prng;
use taufield::stepper::ExecutionTier;

fn make_clock(cfg: SimConfig, tier: ExecutionTier) -> SimulationClock {
    // Long enough that the benchmark never reaches completion.
    let cfg = cfg.with_steps(u64::MAX).with_cadence(0, 0);
    let mut clock = SimulationClock::new(cfg).unwrap();
    clock.set_execution_tier(tier);
    clock
}

/// Benchmark the periodic Laplacian with varying grid sizes.
fn bench_laplacian(c: &mut Criterion) {
    let mut group = c.benchmark_group("laplacian");

    for size in [64usize, 128, 256, 512].iter() {
        group.throughput(Throughput::Elements((*size * *size) as u64));

        group.bench_with_input(BenchmarkId::new("5pt", size), size, |b, &size| {
            let grid = Grid::new(size, size, 1.0, 1.0).unwrap();
            let mut field = Field::zeros(size, size);
            Prng::new(42).add_uniform(field.as_mut_slice(), 1.0);

            b.iter(|| black_box(laplacian(&grid, &field).sum()));
        });
    }

    group.finish();
}

/// Benchmark a full tick under each coupling.
fn bench_tick_coupling(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_coupling");

    let size = 128;
    group.throughput(Throughput::Elements((size * size) as u64));

    for (name, cfg) in [
        (
            "time_step",
            SimConfig::dynamic_tau().with_coupling(TauCoupling::TimeStep),
        ),
        (
            "effective_diffusion",
            SimConfig::dynamic_tau().with_coupling(TauCoupling::EffectiveDiffusion),
        ),
        ("resource", SimConfig::resource_coupled()),
    ] {
        group.bench_function(name, |b| {
            let mut clock = make_clock(cfg.clone().with_grid(size, size), ExecutionTier::Scalar);

            b.iter(|| {
                clock.tick(&mut NullSink, &mut NullSink).unwrap();
                black_box(clock.step_index())
            });
        });
    }

    group.finish();
}

/// Benchmark a full tick comparing execution tiers at a fixed size.
fn bench_tick_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_tier");

    let size = 256;
    group.throughput(Throughput::Elements((size * size) as u64));

    // Scalar
    group.bench_function("scalar_256", |b| {
        let mut clock = make_clock(
            SimConfig::resource_coupled().with_grid(size, size),
            ExecutionTier::Scalar,
        );

        b.iter(|| {
            clock.tick(&mut NullSink, &mut NullSink).unwrap();
            black_box(clock.step_index())
        });
    });

    // Parallel (falls back to scalar if feature not enabled)
    group.bench_function("parallel_256", |b| {
        let mut clock = make_clock(
            SimConfig::resource_coupled().with_grid(size, size),
            ExecutionTier::Parallel,
        );

        b.iter(|| {
            clock.tick(&mut NullSink, &mut NullSink).unwrap();
            black_box(clock.step_index())
        });
    });

    group.finish();
}

/// Benchmark checkpoint save and restore.
fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint");

    for size in [64usize, 128, 256].iter() {
        group.bench_with_input(BenchmarkId::new("save", size), size, |b, &size| {
            let clock = make_clock(
                SimConfig::resource_coupled().with_grid(size, size),
                ExecutionTier::Scalar,
            );
            let mut buf = Vec::with_capacity(64 * 1024);

            b.iter(|| {
                buf.clear();
                clock.checkpoint_to(&mut buf).unwrap();
                black_box(buf.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("restore", size), size, |b, &size| {
            let clock = make_clock(
                SimConfig::resource_coupled().with_grid(size, size),
                ExecutionTier::Scalar,
            );
            let mut buf = Vec::new();
            clock.checkpoint_to(&mut buf).unwrap();
            let cfg = clock.config().clone();

            b.iter(|| {
                let mut cursor = std::io::Cursor::new(&buf);
                let restored = SimulationClock::restore_from(cfg.clone(), &mut cursor).unwrap();
                black_box(restored.step_index())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_laplacian,
    bench_tick_coupling,
    bench_tick_tiers,
    bench_checkpoint,
);

criterion_main!(benches);
