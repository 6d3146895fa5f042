//! Simulated device: platform description, plan channel and launches.

use crate::error::{Result, SimError};
use crate::kernels::Reduction;
use crate::memory::{AtomicOutput, GlobalBuffer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tilepipe::api::{announce, check_shared_sink, core_chunks};
use tilepipe::exec::{CoreChunk, CoreReport, Merge, TileExecutor, TileKernel, TileSink};
use tilepipe::plan::DEFAULT_ALIGNMENT_BYTES;
use tilepipe::types::{Accumulate, Element};
use tilepipe::{KernelProfile, LaunchReport, PartitionStrategy, TilingPlan, WorkloadDescriptor};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Scratchpad assumed when the host cache size cannot be detected.
pub const FALLBACK_SCRATCHPAD_BYTES: usize = 256 * 1024;

fn default_alignment_bytes() -> usize {
    DEFAULT_ALIGNMENT_BYTES
}

/// What the platform capability query reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub core_count: usize,
    /// Usable scratchpad bytes per core.
    pub scratchpad_bytes: usize,
    #[serde(default = "default_alignment_bytes")]
    pub alignment_bytes: usize,
}

impl PlatformInfo {
    pub fn new(core_count: usize, scratchpad_bytes: usize) -> Self {
        Self {
            core_count,
            scratchpad_bytes,
            alignment_bytes: DEFAULT_ALIGNMENT_BYTES,
        }
    }

    pub fn alignment(mut self, alignment_bytes: usize) -> Self {
        self.alignment_bytes = alignment_bytes;
        self
    }

    /// Model the host: one core per hardware thread, one L2 cache of
    /// scratchpad each.
    pub fn host() -> Self {
        let core_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let scratchpad_bytes = detect_l2_bytes().unwrap_or_else(|| {
            log::warn!(
                "L2 cache size not detected, assuming {FALLBACK_SCRATCHPAD_BYTES} bytes of scratchpad"
            );
            FALLBACK_SCRATCHPAD_BYTES
        });
        Self::new(core_count, scratchpad_bytes)
    }

    /// Descriptor for `total_units` units on this platform.
    pub fn workload(
        &self,
        total_units: usize,
        unit_stride: usize,
        element_size: usize,
    ) -> WorkloadDescriptor {
        WorkloadDescriptor::new(total_units, unit_stride, element_size)
            .cores(self.core_count)
            .scratchpad(self.scratchpad_bytes)
            .alignment(self.alignment_bytes)
    }
}

#[cfg(target_os = "linux")]
fn detect_l2_bytes() -> Option<usize> {
    for idx in 0..8 {
        let base = format!("/sys/devices/system/cpu/cpu0/cache/index{idx}");
        let Ok(level) = std::fs::read_to_string(format!("{base}/level")) else {
            continue;
        };
        let Ok(ctype) = std::fs::read_to_string(format!("{base}/type")) else {
            continue;
        };
        if level.trim() != "2" || ctype.trim() != "Unified" {
            continue;
        }
        let size = std::fs::read_to_string(format!("{base}/size")).ok()?;
        return parse_cache_size(&size);
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn detect_l2_bytes() -> Option<usize> {
    None
}

/// Parse a sysfs cache size such as `512K`, `2M` or `1024`.
fn parse_cache_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let bytes = if let Some(kb) = s.strip_suffix('K') {
        kb.parse::<usize>().ok()?.checked_mul(1024)?
    } else if let Some(mb) = s.strip_suffix('M') {
        mb.parse::<usize>().ok()?.checked_mul(1024 * 1024)?
    } else {
        s.parse::<usize>().ok()?
    };
    (bytes > 0).then_some(bytes)
}

/// Device configuration, loadable from JSON.
///
/// ```
/// use tilepipe_sim::SimConfig;
///
/// let cfg: SimConfig = serde_json::from_str(
///     r#"{"platform": {"core_count": 8, "scratchpad_bytes": 8192}, "strategy": "balanced"}"#,
/// )
/// .unwrap();
/// assert_eq!(cfg.platform.alignment_bytes, 32);
/// assert_eq!(cfg.reserved_bytes, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub platform: PlatformInfo,
    #[serde(default)]
    pub strategy: PartitionStrategy,
    /// Scratchpad bytes every kernel holds back.
    #[serde(default)]
    pub reserved_bytes: usize,
}

impl From<PlatformInfo> for SimConfig {
    fn from(platform: PlatformInfo) -> Self {
        Self {
            platform,
            strategy: PartitionStrategy::default(),
            reserved_bytes: 0,
        }
    }
}

/// A simulated array of scratchpad-based cores.
///
/// Every launch plans once, encodes the plan into one byte block, and has
/// each core decode that block before running its executor, just as device
/// cores read a tiling-data block from global memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimDevice {
    config: SimConfig,
}

impl SimDevice {
    pub fn new(platform: PlatformInfo) -> Self {
        Self::with_config(platform.into())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Device modelled on the host machine.
    pub fn host() -> Self {
        let device = Self::new(PlatformInfo::host());
        log::debug!("host device: {:?}", device.config.platform);
        device
    }

    /// Device from a JSON [`SimConfig`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_config(serde_json::from_str(json)?))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.config)?)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.config.platform
    }

    pub fn core_count(&self) -> usize {
        self.config.platform.core_count
    }

    /// Plan `workload` with `profile` as given.
    pub fn plan(
        &self,
        workload: &WorkloadDescriptor,
        profile: &KernelProfile,
    ) -> Result<TilingPlan> {
        Ok(tilepipe::plan::plan(workload, profile)?)
    }

    /// Profile this device uses for `kernel`.
    pub fn profile<K: TileKernel>(&self, kernel: &K) -> KernelProfile {
        KernelProfile::for_kernel(kernel)
            .strategy(self.config.strategy)
            .reserve(self.config.reserved_bytes)
    }

    /// Plan `total_units` units of `kernel` on this device.
    pub fn plan_kernel<K: TileKernel>(&self, kernel: &K, total_units: usize) -> Result<TilingPlan> {
        let workload = self
            .config
            .platform
            .workload(total_units, kernel.unit_stride(), K::In::size());
        self.plan(&workload, &self.profile(kernel))
    }

    /// Run `kernel` over `input`, storing row `i` at unit `i` of `output`.
    pub fn launch<K: TileKernel>(
        &self,
        kernel: &K,
        input: &GlobalBuffer<K::In>,
        output: &mut GlobalBuffer<K::Out>,
    ) -> Result<LaunchReport> {
        check_input(kernel, input)?;
        if output.unit_stride() != kernel.output_stride() || output.units() != input.units() {
            return Err(SimError::DimensionMismatch(format!(
                "output holds {} units of {}, kernel writes {} units of {}",
                output.units(),
                output.unit_stride(),
                input.units(),
                kernel.output_stride()
            )));
        }

        let plan = self.plan_kernel(kernel, input.units())?;
        let block = plan.to_bytes();
        let jobs = core_chunks(&plan, kernel.output_stride(), output.as_mut_slice())?;
        announce(&plan);

        let run = |(core, mut sink): (usize, CoreChunk<'_, K::Out>)| -> Result<CoreReport> {
            run_core(&block, core, kernel, input.as_slice(), &mut sink)
        };

        #[cfg(feature = "parallel")]
        let cores = jobs.into_par_iter().map(run).collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let cores = jobs.into_iter().map(run).collect::<Result<Vec<_>>>()?;

        Ok(LaunchReport { plan, cores })
    }

    /// Run `kernel` over `input` with every core merging into `output`.
    pub fn launch_accumulate<K, A>(
        &self,
        kernel: &K,
        input: &GlobalBuffer<K::In>,
        output: &AtomicOutput<A>,
    ) -> Result<LaunchReport>
    where
        K: TileKernel,
        A: Accumulate<Scalar = K::Out>,
    {
        let (plan, block) = self.prepare_accumulate(kernel, input, output)?;
        let run = |core: usize| -> Result<CoreReport> {
            let mut sink = Merge::new(output, kernel.output_stride());
            run_core(&block, core, kernel, input.as_slice(), &mut sink)
        };

        #[cfg(feature = "parallel")]
        let cores = (0..plan.core_count)
            .into_par_iter()
            .map(run)
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let cores = (0..plan.core_count).map(run).collect::<Result<Vec<_>>>()?;

        Ok(LaunchReport { plan, cores })
    }

    /// Like [`SimDevice::launch_accumulate`], but the cores run one after
    /// another in a permutation drawn from `seed`.
    ///
    /// Reports stay in core order.
    pub fn launch_shuffled<K, A>(
        &self,
        kernel: &K,
        input: &GlobalBuffer<K::In>,
        output: &AtomicOutput<A>,
        seed: u64,
    ) -> Result<LaunchReport>
    where
        K: TileKernel,
        A: Accumulate<Scalar = K::Out>,
    {
        let (plan, block) = self.prepare_accumulate(kernel, input, output)?;
        let mut order: Vec<usize> = (0..plan.core_count).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        log::debug!("seed {seed}: core order {order:?}");

        let mut cores = vec![None; plan.core_count];
        for core in order {
            let mut sink = Merge::new(output, kernel.output_stride());
            cores[core] = Some(run_core(&block, core, kernel, input.as_slice(), &mut sink)?);
        }
        Ok(LaunchReport {
            plan,
            cores: cores.into_iter().flatten().collect(),
        })
    }

    /// Run a reduction kernel into fresh slots and return them.
    pub fn reduce<K: Reduction>(
        &self,
        kernel: &K,
        input: &GlobalBuffer<K::In>,
    ) -> Result<Vec<K::Out>> {
        let output = AtomicOutput::<K::Acc>::alloc(kernel.slots(), kernel.output_stride())?;
        self.launch_accumulate(kernel, input, &output)?;
        Ok(output.into_host())
    }

    fn prepare_accumulate<K, A>(
        &self,
        kernel: &K,
        input: &GlobalBuffer<K::In>,
        output: &AtomicOutput<A>,
    ) -> Result<(TilingPlan, Vec<u8>)>
    where
        K: TileKernel,
        A: Accumulate<Scalar = K::Out>,
    {
        check_input(kernel, input)?;
        let plan = self.plan_kernel(kernel, input.units())?;
        check_shared_sink(&plan, kernel, output)?;
        announce(&plan);
        let block = plan.to_bytes();
        Ok((plan, block))
    }
}

fn check_input<K: TileKernel>(kernel: &K, input: &GlobalBuffer<K::In>) -> Result<()> {
    if input.unit_stride() != kernel.unit_stride() {
        return Err(SimError::DimensionMismatch(format!(
            "input units hold {} scalars, kernel reads {}",
            input.unit_stride(),
            kernel.unit_stride()
        )));
    }
    Ok(())
}

/// One simulated core: decode the plan block, then run this core's share.
fn run_core<K, S>(
    block: &[u8],
    core: usize,
    kernel: &K,
    input: &[K::In],
    sink: &mut S,
) -> Result<CoreReport>
where
    K: TileKernel,
    S: TileSink<K::Out>,
{
    let plan = TilingPlan::from_bytes(block)?;
    log::trace!("core {core}: decoded plan of {} bytes", block.len());
    Ok(TileExecutor::new(&plan, core)?.run(kernel, input, sink)?)
}
