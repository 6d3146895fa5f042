//! Tiling planner and double-buffered tile executor for data-parallel kernels
//! on arrays of scratchpad-based cores.
//!
//! Every kernel invocation runs in two phases:
//!
//! 1. **Planning** ([`plan`]): once, on the host. A [`TilePlanner`] splits
//!    `total_units` work-items over the cores and sizes a tile so that all
//!    pipeline buffers fit each core's scratchpad.
//! 2. **Execution** ([`exec`]): once per core, all cores concurrently. A
//!    [`TileExecutor`](exec::TileExecutor) streams its share through a
//!    copy-in → compute → copy-out pipeline, two tiles deep.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ host:  WorkloadDescriptor + KernelProfile ──plan──▶ TilingPlan     │
//! │                                   │ to_bytes / from_bytes          │
//! │ core c:  assignment(c) ──▶ for each tile:                          │
//! │            CopyIn(global → ping/pong) → Compute → CopyOut(sink)    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Plan parameters
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `units_per_core` | common per-core share, a multiple of `unit_alignment` |
//! | `remainder_cores` | leading cores with one extra aligned group |
//! | `tail_core_units` | share of the last used core |
//! | `tile_units_per_loop` | units moved per pipeline iteration |
//!
//! # Example
//!
//! ```
//! use tilepipe::{TilePlanner, WorkloadDescriptor};
//!
//! let desc = WorkloadDescriptor::for_elements::<f32>(1000, 1)
//!     .cores(8)
//!     .scratchpad(8192);
//! let plan = TilePlanner::default().plan(&desc).unwrap();
//!
//! let covered: usize = plan.assignments().map(|a| a.units).sum();
//! assert_eq!(covered, 1000);
//! assert_eq!(plan.tile_units_per_loop % plan.unit_alignment, 0);
//! ```
//!
//! # Features
//!
//! - `parallel` (default): run cores on the rayon thread pool.

pub mod align;
pub mod api;
pub mod error;
pub mod exec;
pub mod plan;
pub mod types;

pub use api::{
    core_chunks, run_accumulate, run_disjoint, LaunchReport, TiledLaunch, DEFAULT_SCRATCHPAD_BYTES,
};
pub use error::{ErrorClass, Result, TileError};
pub use exec::{TileExecutor, TileKernel};
pub use plan::{
    CoreAssignment, KernelProfile, LoopShape, PartitionStrategy, TilePlanner, TilingPlan,
    WorkloadDescriptor,
};
pub use types::{Accumulate, Element, Max, Min, Sum};
