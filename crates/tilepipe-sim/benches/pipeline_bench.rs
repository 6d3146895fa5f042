//! Benchmarks for planning and simulated launches.
//!
//! - Planning alone, per strategy
//! - Disjoint map (`Scale`) across core counts
//! - Many-to-one reduction (`ScatterSum`) across core counts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tilepipe::types::Sum;
use tilepipe::{KernelProfile, PartitionStrategy, TilePlanner, WorkloadDescriptor};
use tilepipe_sim::{AtomicOutput, GlobalBuffer, PlatformInfo, Scale, ScatterSum, SimDevice};

const SCRATCHPAD: usize = 192 * 1024;

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Plan");

    for strategy in [PartitionStrategy::TailCore, PartitionStrategy::Balanced] {
        let planner = TilePlanner::new(KernelProfile::default().strategy(strategy));
        let desc = WorkloadDescriptor::for_elements::<f32>(1_000_003, 3)
            .cores(48)
            .scratchpad(SCRATCHPAD);
        group.bench_function(BenchmarkId::new("strategy", format!("{strategy:?}")), |b| {
            b.iter(|| black_box(planner.plan(black_box(&desc)).unwrap()))
        });
    }

    group.finish();
}

fn bench_scale(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scale");
    group.sample_size(20);

    let units = 1 << 20;
    let data: Vec<f32> = (0..units).map(|i| ((i % 1000) as f32) * 0.01).collect();
    let input = GlobalBuffer::from_host(&data, 1).unwrap();
    group.throughput(Throughput::Elements(units as u64));

    for cores in [1, 4, 16] {
        let dev = SimDevice::new(PlatformInfo::new(cores, SCRATCHPAD));
        let mut output = GlobalBuffer::alloc(units, 1).unwrap();
        group.bench_with_input(BenchmarkId::new("cores", cores), &cores, |b, _| {
            b.iter(|| black_box(dev.launch(&Scale::new(2.0f32, 1), &input, &mut output).unwrap()))
        });
    }

    group.finish();
}

fn bench_scatter_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("ScatterSum");
    group.sample_size(20);

    let units = 1 << 18;
    let slots = 1000;
    let data: Vec<i64> = (0..units)
        .flat_map(|i| [((i * 7919) % slots) as i64, (i % 97) as i64])
        .collect();
    let input = GlobalBuffer::from_host(&data, 2).unwrap();
    let kernel = ScatterSum::new(slots);
    group.throughput(Throughput::Elements(units as u64));

    for cores in [1, 4, 16] {
        let dev = SimDevice::new(PlatformInfo::new(cores, SCRATCHPAD));
        let output = AtomicOutput::<Sum<i64>>::alloc(slots, 1).unwrap();
        group.bench_with_input(BenchmarkId::new("cores", cores), &cores, |b, _| {
            b.iter(|| {
                output.reset();
                black_box(dev.launch_accumulate(&kernel, &input, &output).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan, bench_scale, bench_scatter_sum);
criterion_main!(benches);
