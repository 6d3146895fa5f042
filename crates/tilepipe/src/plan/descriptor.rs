use crate::types::Element;
use serde::{Deserialize, Serialize};

/// Default DMA/compute alignment in bytes.
pub const DEFAULT_ALIGNMENT_BYTES: usize = 32;

/// Physical instances per tile queue ("ping" and "pong").
pub const BUFFER_DEPTH: usize = 2;

/// Input to planning: what to split and what hardware to split it over.
///
/// Immutable for the duration of one kernel invocation.
///
/// # Example
///
/// ```
/// use tilepipe::WorkloadDescriptor;
///
/// let desc = WorkloadDescriptor::for_elements::<f32>(1000, 1)
///     .cores(8)
///     .scratchpad(8192);
/// assert_eq!(desc.element_size, 4);
/// assert_eq!(desc.alignment_bytes, 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    /// Independent work-items (points, boxes, voxels, rows).
    pub total_units: usize,
    /// Scalar elements per work-item.
    pub unit_stride: usize,
    /// Bytes per scalar.
    pub element_size: usize,
    /// Cores available on the target.
    pub core_count: usize,
    /// Usable scratchpad bytes per core.
    pub scratchpad_bytes: usize,
    /// Minimum transfer/compute alignment; 0 means none.
    #[serde(default = "default_alignment_bytes")]
    pub alignment_bytes: usize,
}

fn default_alignment_bytes() -> usize {
    DEFAULT_ALIGNMENT_BYTES
}

impl WorkloadDescriptor {
    /// Describe `total_units` items of `unit_stride` scalars of `element_size`
    /// bytes, on a single core with no scratchpad yet.
    pub fn new(total_units: usize, unit_stride: usize, element_size: usize) -> Self {
        Self {
            total_units,
            unit_stride,
            element_size,
            core_count: 1,
            scratchpad_bytes: 0,
            alignment_bytes: DEFAULT_ALIGNMENT_BYTES,
        }
    }

    /// Like [`WorkloadDescriptor::new`] with the element size taken from `T`.
    pub fn for_elements<T: Element>(total_units: usize, unit_stride: usize) -> Self {
        Self::new(total_units, unit_stride, T::size())
    }

    /// Set the core count.
    pub fn cores(mut self, core_count: usize) -> Self {
        self.core_count = core_count;
        self
    }

    /// Set the usable scratchpad bytes per core.
    pub fn scratchpad(mut self, scratchpad_bytes: usize) -> Self {
        self.scratchpad_bytes = scratchpad_bytes;
        self
    }

    /// Set the alignment in bytes.
    pub fn alignment(mut self, alignment_bytes: usize) -> Self {
        self.alignment_bytes = alignment_bytes;
        self
    }
}

/// How the per-core shares are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Every used core but the last gets the aligned ceiling share; the last
    /// core gets whatever remains.
    #[default]
    TailCore,
    /// Every used core gets the same number of aligned groups, the leading
    /// `remainder_cores` get one more, and the last core also absorbs the
    /// non-aligned shortfall. Busiest and least-busy cores differ by at most
    /// one aligned group.
    Balanced,
}

impl PartitionStrategy {
    pub(crate) fn code(self) -> u64 {
        match self {
            PartitionStrategy::TailCore => 0,
            PartitionStrategy::Balanced => 1,
        }
    }

    pub(crate) fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(PartitionStrategy::TailCore),
            1 => Some(PartitionStrategy::Balanced),
            _ => None,
        }
    }
}

/// Per-kernel planning parameters.
///
/// Together with the descriptor's `unit_stride` and `element_size` these are
/// the only numbers a kernel contributes to its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelProfile {
    /// Tile-sized buffers live at once: queues × buffer depth.
    pub buffer_multiplier: usize,
    /// Scratchpad bytes held back for bookkeeping and queue control.
    pub reserved_bytes: usize,
    /// Do not spread work thinner than this many units per core.
    pub min_units_per_core: usize,
    /// Share derivation.
    pub strategy: PartitionStrategy,
}

impl Default for KernelProfile {
    /// One double-buffered input queue and one double-buffered output queue.
    fn default() -> Self {
        Self::double_buffered(2)
    }
}

impl KernelProfile {
    /// `queues` tile queues, each [`BUFFER_DEPTH`] deep.
    pub fn double_buffered(queues: usize) -> Self {
        Self {
            buffer_multiplier: queues * BUFFER_DEPTH,
            reserved_bytes: 0,
            min_units_per_core: 1,
            strategy: PartitionStrategy::TailCore,
        }
    }

    /// Set the buffer multiplier directly.
    pub fn buffers(mut self, buffer_multiplier: usize) -> Self {
        self.buffer_multiplier = buffer_multiplier;
        self
    }

    /// Hold back `reserved_bytes` of every scratchpad.
    pub fn reserve(mut self, reserved_bytes: usize) -> Self {
        self.reserved_bytes = reserved_bytes;
        self
    }

    /// Lower bound on units per used core.
    pub fn min_units_per_core(mut self, units: usize) -> Self {
        self.min_units_per_core = units;
        self
    }

    /// Select the partition strategy.
    pub fn strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
