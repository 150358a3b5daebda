//! Criterion benchmarks for the poolnet timestep.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use poolnet::prelude::*;
use poolnet::temporal::TemporalState;

/// A drifting bar of active pixels, so the network keeps seeing related input.
fn make_inputs(size: u32, row: u32, count: usize) -> Vec<SparseVector> {
    let mut rng = Prng::new(42);
    (0..count)
        .map(|t| {
            let column = (t as u32 / 4) % row + 1;
            let mut input: SparseVector = (0..size / row)
                .map(|y| (y * row + column, 1.0))
                .collect();
            for _ in 0..4 {
                input.insert(rng.gen_range_usize(1, size as usize + 1) as u32, 0.5);
            }
            input
        })
        .collect()
}

fn make_network(size: u32, row: u32, square: u32, tier: ExecutionTier) -> Network {
    let config = NetworkConfig::single(size, "L", row, square)
        .with_seed(42)
        .with_execution_tier(tier);
    Network::new(config).expect("valid bench config")
}

/// Benchmark timestep() with varying layer sizes.
fn bench_timestep_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep_size");

    for &(size, row) in [(256u32, 16u32), (784, 28), (4096, 64)].iter() {
        group.throughput(Throughput::Elements(size as u64));
        let inputs = make_inputs(size, row, 256);

        group.bench_with_input(BenchmarkId::new("scalar", size), &size, |b, &size| {
            let mut network = make_network(size, row, 2, ExecutionTier::Scalar);
            // Warm up so pools exist before measuring.
            for input in &inputs {
                network.timestep(std::slice::from_ref(input), None);
            }
            let mut t = 0;
            b.iter(|| {
                let input = &inputs[t % inputs.len()];
                t += 1;
                black_box(network.timestep(std::slice::from_ref(input), None).len())
            });
        });
    }

    group.finish();
}

/// Benchmark timestep() comparing execution tiers at a fixed size.
fn bench_timestep_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep_tier");
    let (size, row) = (4096u32, 64u32);
    group.throughput(Throughput::Elements(size as u64));
    let inputs = make_inputs(size, row, 256);

    for (name, tier) in [("scalar", ExecutionTier::Scalar), ("parallel", ExecutionTier::Parallel)] {
        // Parallel falls back to scalar if the feature is not enabled.
        group.bench_function(name, |b| {
            let mut network = make_network(size, row, 2, tier);
            let mut t = 0;
            b.iter(|| {
                let input = &inputs[t % inputs.len()];
                t += 1;
                black_box(network.timestep(std::slice::from_ref(input), None).len())
            });
        });
    }

    group.finish();
}

/// The averager's cost must not depend on the window length.
fn bench_temporal_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("temporal_window");
    let inputs = make_inputs(784, 28, 64);

    for window in [1usize, 10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(window), window, |b, &window| {
            let mut state = TemporalState::new();
            let mut t = 0;
            b.iter(|| {
                let input = &inputs[t % inputs.len()];
                t += 1;
                black_box(state.update(input, window, 1000.0).len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_timestep_sizes,
    bench_timestep_tiers,
    bench_temporal_window
);
criterion_main!(benches);
