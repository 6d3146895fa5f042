//! End-to-end tests of the executor pipeline across whole plans.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use tilepipe::exec::{
    AtomicSlots, CoreChunk, InputTile, Merge, OutputTile, PipelineTrace, Stage, TileExecutor,
    TileKernel,
};
use tilepipe::types::{Max, Sum};
use tilepipe::{
    run_accumulate, run_disjoint, KernelProfile, PartitionStrategy, TilePlanner, TilingPlan,
    WorkloadDescriptor,
};

/// Unit = (a, b); output = (a + b, a - b).
struct SumDiff;

impl TileKernel for SumDiff {
    type In = i32;
    type Out = i32;

    fn unit_stride(&self) -> usize {
        2
    }

    fn compute(&self, tile: &InputTile<'_, i32>, out: &mut OutputTile<'_, i32>) {
        for i in 0..tile.units() {
            let u = tile.unit(i);
            out.unit_mut(i).copy_from_slice(&[u[0] + u[1], u[0] - u[1]]);
        }
    }
}

/// Unit = (slot, value); value merges into `slot`.
struct Scatter;

impl TileKernel for Scatter {
    type In = i64;
    type Out = i64;

    fn unit_stride(&self) -> usize {
        2
    }

    fn output_stride(&self) -> usize {
        1
    }

    fn routes_output(&self) -> bool {
        true
    }

    fn compute(&self, tile: &InputTile<'_, i64>, out: &mut OutputTile<'_, i64>) {
        for i in 0..tile.units() {
            let u = tile.unit(i);
            out.unit_mut(i)[0] = u[1];
            out.route(i, Some(u[0] as usize));
        }
    }
}

fn plan_for<K: TileKernel>(
    kernel: &K,
    total: usize,
    cores: usize,
    scratch: usize,
    strategy: PartitionStrategy,
) -> TilingPlan {
    let desc = WorkloadDescriptor::for_kernel(kernel, total)
        .cores(cores)
        .scratchpad(scratch);
    TilePlanner::new(KernelProfile::for_kernel(kernel).strategy(strategy))
        .plan(&desc)
        .unwrap()
}

fn scatter_input(units: usize, slots: usize) -> Vec<i64> {
    (0..units)
        .flat_map(|i| [((i * 7919) % slots) as i64, (i as i64 % 13) - 6])
        .collect()
}

fn sequential_reference(input: &[i64], slots: usize) -> Vec<i64> {
    let mut out = vec![0i64; slots];
    for unit in input.chunks_exact(2) {
        out[unit[0] as usize] += unit[1];
    }
    out
}

#[test]
fn test_disjoint_matches_direct_map() {
    let input: Vec<i32> = (0..2 * 5000).map(|i| i - 3000).collect();
    let plan = plan_for(&SumDiff, 5000, 8, 1024, PartitionStrategy::TailCore);
    assert!(plan.tail_loop.loops > 2);
    let mut output = vec![0i32; 2 * 5000];
    run_disjoint(&plan, &SumDiff, &input, &mut output).unwrap();
    for (i, pair) in output.chunks_exact(2).enumerate() {
        let (a, b) = (input[2 * i], input[2 * i + 1]);
        assert_eq!(pair, &[a + b, a - b], "unit {i}");
    }
}

#[test]
fn test_every_core_trace_is_fenced() {
    let input: Vec<i32> = vec![1; 2 * 3000];
    let plan = plan_for(&SumDiff, 3000, 4, 512, PartitionStrategy::Balanced);
    let mut output = vec![0i32; 2 * 3000];
    for a in plan.assignments() {
        let chunk = &mut output[2 * a.first_unit..2 * a.end_unit()];
        let mut trace = PipelineTrace::new();
        TileExecutor::new(&plan, a.core)
            .unwrap()
            .run_traced(&SumDiff, &input, &mut CoreChunk::new(chunk, a.first_unit, 2), &mut trace)
            .unwrap();
        trace.check_fences().unwrap();
        assert_eq!(trace.len(), 3 * a.shape.loops);
        let copied: usize = trace
            .events()
            .iter()
            .filter(|e| e.stage == Stage::CopyIn)
            .map(|e| e.units)
            .sum();
        assert_eq!(copied, a.units);
    }
    assert!(output.chunks_exact(2).all(|p| p == [2, 0]));
}

#[test]
fn test_many_to_one_reduction_order_independent() {
    let slots = 100;
    let input = scatter_input(10_000, slots);
    let expected = sequential_reference(&input, slots);
    let plan = plan_for(&Scatter, 10_000, 8, 2048, PartitionStrategy::TailCore);
    assert_eq!(plan.used_core_count, 8);

    for seed in 0..16u64 {
        let mut order: Vec<usize> = (0..plan.core_count).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let sink = AtomicSlots::<Sum<i64>>::new(slots);
        for core in order {
            TileExecutor::new(&plan, core)
                .unwrap()
                .run(&Scatter, &input, &mut Merge::new(&sink, 1))
                .unwrap();
        }
        assert_eq!(sink.to_vec(), expected, "seed {seed}");
    }

    let sink = AtomicSlots::<Sum<i64>>::new(slots);
    run_accumulate(&plan, &Scatter, &input, &sink).unwrap();
    assert_eq!(sink.into_vec(), expected);
}

#[test]
fn test_scatter_max_single_vs_many_cores() {
    let input = scatter_input(4000, 37);
    let one = plan_for(&Scatter, 4000, 1, 4096, PartitionStrategy::TailCore);
    let many = plan_for(&Scatter, 4000, 16, 4096, PartitionStrategy::Balanced);

    let a = AtomicSlots::<Max<i64>>::new(37);
    let b = AtomicSlots::<Max<i64>>::new(37);
    run_accumulate(&one, &Scatter, &input, &a).unwrap();
    run_accumulate(&many, &Scatter, &input, &b).unwrap();
    assert_eq!(a.to_vec(), b.to_vec());
    assert!(a.to_vec().iter().all(|&v| v == 6));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_disjoint_covers_every_unit(
        total in 0usize..3000,
        cores in 1usize..17,
        scratch in prop_oneof![Just(256usize), Just(1024), Just(8192)],
        balanced in any::<bool>(),
    ) {
        let strategy = if balanced { PartitionStrategy::Balanced } else { PartitionStrategy::TailCore };
        let plan = plan_for(&SumDiff, total, cores, scratch, strategy);
        let input: Vec<i32> = (0..2 * total as i32).collect();
        let mut output = vec![i32::MIN; 2 * total];
        let reports = run_disjoint(&plan, &SumDiff, &input, &mut output).unwrap();
        prop_assert_eq!(reports.iter().map(|r| r.units).sum::<usize>(), total);
        for (i, pair) in output.chunks_exact(2).enumerate() {
            prop_assert_eq!(pair, &[input[2 * i] + input[2 * i + 1], -1][..]);
        }
    }

    #[test]
    fn prop_reduction_any_order(
        units in 1usize..2000,
        slots in 1usize..50,
        cores in 1usize..12,
        seed in any::<u64>(),
    ) {
        let input = scatter_input(units, slots);
        let plan = plan_for(&Scatter, units, cores, 2048, PartitionStrategy::Balanced);
        let mut order: Vec<usize> = (0..cores).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let sink = AtomicSlots::<Sum<i64>>::new(slots);
        for core in order {
            TileExecutor::new(&plan, core)
                .unwrap()
                .run(&Scatter, &input, &mut Merge::new(&sink, 1))
                .unwrap();
        }
        prop_assert_eq!(sink.to_vec(), sequential_reference(&input, slots));
    }
}
