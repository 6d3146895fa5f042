use crate::align::checked_product;
use crate::error::{Result, TileError};
use crate::exec::{CoreChunk, CoreReport, Merge, SharedSink, TileExecutor, TileKernel};
use crate::plan::{
    KernelProfile, PartitionStrategy, TilePlanner, TilingPlan, WorkloadDescriptor,
    DEFAULT_ALIGNMENT_BYTES,
};
use crate::types::Element;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Scratchpad assumed by [`TiledLaunch`] until one is given.
pub const DEFAULT_SCRATCHPAD_BYTES: usize = 192 * 1024;

/// Run every core of `plan` with plain stores into `output`.
///
/// Each core receives the exclusive chunk of `output` holding its own units,
/// so cores never share a location. Kernels that route rows elsewhere fail
/// with [`TileError::RegionTooSmall`] on the first foreign row.
///
/// # Example
///
/// ```
/// use tilepipe::exec::{InputTile, OutputTile, TileKernel};
/// use tilepipe::{run_disjoint, KernelProfile, TilePlanner, WorkloadDescriptor};
///
/// struct AddOne;
///
/// impl TileKernel for AddOne {
///     type In = i32;
///     type Out = i32;
///     fn unit_stride(&self) -> usize {
///         1
///     }
///     fn compute(&self, tile: &InputTile<'_, i32>, out: &mut OutputTile<'_, i32>) {
///         for (o, &x) in out.as_mut_slice().iter_mut().zip(tile.as_slice()) {
///             *o = x + 1;
///         }
///     }
/// }
///
/// let input: Vec<i32> = (0..100).collect();
/// let desc = WorkloadDescriptor::for_kernel(&AddOne, input.len())
///     .cores(4)
///     .scratchpad(1024);
/// let plan = TilePlanner::new(KernelProfile::for_kernel(&AddOne)).plan(&desc).unwrap();
///
/// let mut output = vec![0; 100];
/// run_disjoint(&plan, &AddOne, &input, &mut output).unwrap();
/// assert_eq!(output[99], 100);
/// ```
pub fn run_disjoint<K: TileKernel>(
    plan: &TilingPlan,
    kernel: &K,
    input: &[K::In],
    output: &mut [K::Out],
) -> Result<Vec<CoreReport>> {
    let jobs = core_chunks(plan, kernel.output_stride(), output)?;
    announce(plan);

    let run = |(core, mut sink): (usize, CoreChunk<'_, K::Out>)| -> Result<CoreReport> {
        TileExecutor::new(plan, core)?.run(kernel, input, &mut sink)
    };

    #[cfg(feature = "parallel")]
    {
        jobs.into_par_iter().map(run).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.into_iter().map(run).collect()
    }
}

/// Split `output` into the exclusive chunk of every core of `plan`, in core
/// order. Idle cores get empty chunks.
pub fn core_chunks<'o, T: Element>(
    plan: &TilingPlan,
    stride: usize,
    output: &'o mut [T],
) -> Result<Vec<(usize, CoreChunk<'o, T>)>> {
    plan.validate()?;
    let required = checked_product("output elements", &[plan.total_units, stride])?;
    if output.len() < required {
        return Err(TileError::RegionTooSmall {
            region: "output",
            required,
            actual: output.len(),
        });
    }

    let mut chunks = Vec::with_capacity(plan.core_count);
    let mut rest = &mut output[..required];
    for a in plan.assignments() {
        let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(a.units * stride);
        rest = tail;
        chunks.push((a.core, CoreChunk::new(chunk, a.first_unit, stride)));
    }
    Ok(chunks)
}

/// Run every core of `plan`, merging all rows into one shared `sink`.
///
/// Unrouted kernels merge row `i` into slot `i`; routed kernels choose their
/// slots. The result does not depend on the order in which cores finish.
pub fn run_accumulate<K, S>(
    plan: &TilingPlan,
    kernel: &K,
    input: &[K::In],
    sink: &S,
) -> Result<Vec<CoreReport>>
where
    K: TileKernel,
    S: SharedSink<K::Out> + ?Sized,
{
    check_shared_sink(plan, kernel, sink)?;
    let stride = kernel.output_stride();
    announce(plan);

    let run = |core: usize| -> Result<CoreReport> {
        TileExecutor::new(plan, core)?.run(kernel, input, &mut Merge::new(sink, stride))
    };

    #[cfg(feature = "parallel")]
    {
        (0..plan.core_count).into_par_iter().map(run).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..plan.core_count).map(run).collect()
    }
}

/// Validate `plan` and, for unrouted kernels, that `sink` holds every row.
pub fn check_shared_sink<K, S>(plan: &TilingPlan, kernel: &K, sink: &S) -> Result<()>
where
    K: TileKernel,
    S: SharedSink<K::Out> + ?Sized,
{
    plan.validate()?;
    if !kernel.routes_output() {
        let required =
            checked_product("output elements", &[plan.total_units, kernel.output_stride()])?;
        if sink.len() < required {
            return Err(TileError::RegionTooSmall {
                region: "output",
                required,
                actual: sink.len(),
            });
        }
    }
    Ok(())
}

/// Log a launch of `plan`.
pub fn announce(plan: &TilingPlan) {
    log::debug!("launching {plan}");
    if plan.total_units > 0 && plan.idle_cores() > 0 {
        log::warn!(
            "{} of {} cores idle for {} units",
            plan.idle_cores(),
            plan.core_count,
            plan.total_units
        );
    }
}

/// Plan and result of one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub plan: TilingPlan,
    pub cores: Vec<CoreReport>,
}

impl LaunchReport {
    /// Units processed across all cores.
    pub fn units(&self) -> usize {
        self.cores.iter().map(|c| c.units).sum()
    }

    pub fn busy_cores(&self) -> usize {
        self.cores.iter().filter(|c| !c.is_idle()).count()
    }
}

/// Builder that plans and runs a kernel in one go.
///
/// The profile defaults to [`KernelProfile::for_kernel`], so the planned
/// tiles always leave room for the kernel's whole pipeline.
///
/// # Example
///
/// ```
/// use tilepipe::exec::{AtomicSlots, InputTile, OutputTile, TileKernel};
/// use tilepipe::types::Sum;
/// use tilepipe::TiledLaunch;
///
/// /// Counts values per residue mod 3.
/// struct Histogram;
///
/// impl TileKernel for Histogram {
///     type In = u32;
///     type Out = u64;
///     fn unit_stride(&self) -> usize {
///         1
///     }
///     fn routes_output(&self) -> bool {
///         true
///     }
///     fn compute(&self, tile: &InputTile<'_, u32>, out: &mut OutputTile<'_, u64>) {
///         for i in 0..tile.units() {
///             out.unit_mut(i)[0] = 1;
///             out.route(i, Some(tile.unit(i)[0] as usize % 3));
///         }
///     }
/// }
///
/// let input: Vec<u32> = (0..30).collect();
/// let counts = AtomicSlots::<Sum<u64>>::new(3);
/// let report = TiledLaunch::new(&Histogram)
///     .cores(4)
///     .scratchpad(512)
///     .run_accumulate(&input, &counts)
///     .unwrap();
/// assert_eq!(report.units(), 30);
/// assert_eq!(counts.to_vec(), vec![10, 10, 10]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TiledLaunch<'k, K: TileKernel> {
    kernel: &'k K,
    core_count: usize,
    scratchpad_bytes: usize,
    alignment_bytes: usize,
    profile: KernelProfile,
}

impl<'k, K: TileKernel> TiledLaunch<'k, K> {
    pub fn new(kernel: &'k K) -> Self {
        Self {
            kernel,
            core_count: 1,
            scratchpad_bytes: DEFAULT_SCRATCHPAD_BYTES,
            alignment_bytes: DEFAULT_ALIGNMENT_BYTES,
            profile: KernelProfile::for_kernel(kernel),
        }
    }

    pub fn cores(mut self, core_count: usize) -> Self {
        self.core_count = core_count;
        self
    }

    pub fn scratchpad(mut self, scratchpad_bytes: usize) -> Self {
        self.scratchpad_bytes = scratchpad_bytes;
        self
    }

    pub fn alignment(mut self, alignment_bytes: usize) -> Self {
        self.alignment_bytes = alignment_bytes;
        self
    }

    /// Replace the whole profile.
    pub fn profile(mut self, profile: KernelProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.profile = self.profile.strategy(strategy);
        self
    }

    pub fn reserve(mut self, reserved_bytes: usize) -> Self {
        self.profile = self.profile.reserve(reserved_bytes);
        self
    }

    /// Descriptor for `total_units` units under this launch's hardware.
    pub fn descriptor(&self, total_units: usize) -> WorkloadDescriptor {
        WorkloadDescriptor::for_kernel(self.kernel, total_units)
            .cores(self.core_count)
            .scratchpad(self.scratchpad_bytes)
            .alignment(self.alignment_bytes)
    }

    pub fn plan(&self, total_units: usize) -> Result<TilingPlan> {
        TilePlanner::new(self.profile).plan(&self.descriptor(total_units))
    }

    /// Plan for `input` and run with plain stores into `output`.
    pub fn run(&self, input: &[K::In], output: &mut [K::Out]) -> Result<LaunchReport> {
        let plan = self.plan(self.units_in(input)?)?;
        let cores = run_disjoint(&plan, self.kernel, input, output)?;
        Ok(LaunchReport { plan, cores })
    }

    /// Plan for `input` and merge into `sink`.
    pub fn run_accumulate<S>(&self, input: &[K::In], sink: &S) -> Result<LaunchReport>
    where
        S: SharedSink<K::Out> + ?Sized,
    {
        let plan = self.plan(self.units_in(input)?)?;
        let cores = run_accumulate(&plan, self.kernel, input, sink)?;
        Ok(LaunchReport { plan, cores })
    }

    fn units_in(&self, input: &[K::In]) -> Result<usize> {
        let stride = self.kernel.unit_stride();
        if stride == 0 {
            return Err(TileError::InvalidDescriptor("kernel unit_stride is zero".into()));
        }
        if input.len() % stride != 0 {
            return Err(TileError::InvalidDescriptor(format!(
                "input of {} scalars is not a whole number of {stride}-scalar units",
                input.len()
            )));
        }
        Ok(input.len() / stride)
    }
}
