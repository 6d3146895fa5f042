//! Workload partitioning.
//!
//! A [`TilePlanner`] turns a [`WorkloadDescriptor`] and a kernel's
//! [`KernelProfile`] into a [`TilingPlan`]: how many cores take part, how many
//! units each core owns, and how many units move through the scratchpad per
//! pipeline iteration.
//!
//! ```text
//! total_units
//! ├── core 0 ── tile 0 │ tile 1 │ ... │ tail tile
//! ├── core 1 ── ...
//! └── core used-1 (tail core, may be short)
//! ```

mod codec;
mod descriptor;
mod planner;
mod tiling;

pub use codec::{PLAN_BYTES, PLAN_FORMAT_VERSION, PLAN_MAGIC};
pub use descriptor::{
    KernelProfile, PartitionStrategy, WorkloadDescriptor, BUFFER_DEPTH, DEFAULT_ALIGNMENT_BYTES,
};
pub use planner::{plan, TilePlanner};
pub use tiling::{CoreAssignment, LoopShape, TileIter, TileSpan, TilingPlan};
