//! Per-core tile execution.
//!
//! One [`TileExecutor`] runs on each core. It reserves a [`PipelineSlot`] out
//! of the core's [`Scratchpad`] and walks its tiles through three stages:
//!
//! ```text
//! step:      0        1          2          3        ...
//! CopyIn   tile0    tile1      tile2      tile3
//! Compute           tile0      tile1      tile2
//! CopyOut                      tile0      tile1
//! ```
//!
//! Stages are ordered by the state transitions of two [`TileQueue`]s, each
//! holding a "ping" and a "pong" instance, so no instance is refilled before
//! the stage that drains it has run.
//!
//! Output goes to a [`TileSink`]: a [`CoreChunk`] of plain stores when every
//! row lands at its own unit index, or a [`Merge`] into a [`SharedSink`] such
//! as [`AtomicSlots`] when rows from many cores meet in one slot.

mod executor;
mod kernel;
mod queue;
mod scratchpad;
mod sink;
mod trace;

pub use executor::{CoreReport, TileExecutor};
pub use kernel::{pipeline_bytes_per_unit, InputTile, OutputTile, TileKernel};
pub use queue::{BufferId, BufferState, OutputBuffer, PipelineSlot, SlotLayout, TileQueue, ROUTE_BYTES};
pub use scratchpad::Scratchpad;
pub use sink::{AtomicSlots, CoreChunk, Merge, SharedSink, TileSink};
pub use trace::{PipelineTrace, Stage, StageEvent};
