//! Flat binary form of a [`TilingPlan`].
//!
//! The host encodes the plan once; every core decodes the same bytes. The
//! block is a `#[repr(C)]` run of little-endian `u64` fields headed by a magic
//! number and a format version, so a core either reads the complete plan or
//! rejects it.

use super::descriptor::PartitionStrategy;
use super::tiling::{LoopShape, TilingPlan};
use crate::error::{Result, TileError};
use bytemuck::{Pod, Zeroable};

/// `"TILEPLAN"` read as a little-endian integer.
pub const PLAN_MAGIC: u64 = u64::from_le_bytes(*b"TILEPLAN");

/// Bumped whenever the field layout changes.
pub const PLAN_FORMAT_VERSION: u64 = 1;

/// Encoded size in bytes.
pub const PLAN_BYTES: usize = std::mem::size_of::<RawPlan>();

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct RawPlan {
    magic: u64,
    version: u64,
    total_units: u64,
    unit_stride: u64,
    element_size: u64,
    core_count: u64,
    scratchpad_bytes: u64,
    reserved_bytes: u64,
    buffer_multiplier: u64,
    unit_alignment: u64,
    strategy: u64,
    used_core_count: u64,
    units_per_core: u64,
    remainder_cores: u64,
    tail_core_units: u64,
    tile_units_per_loop: u64,
    remainder_loops: u64,
    remainder_tail_units: u64,
    common_loops: u64,
    common_tail_units: u64,
    tail_loops: u64,
    tail_tail_units: u64,
}

fn le(v: usize) -> u64 {
    (v as u64).to_le()
}

fn field(name: &str, raw: u64) -> Result<usize> {
    usize::try_from(u64::from_le(raw))
        .map_err(|_| TileError::MalformedPlan(format!("{name} does not fit usize")))
}

impl TilingPlan {
    /// Encode into a fresh buffer of [`PLAN_BYTES`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.to_raw()).to_vec()
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < PLAN_BYTES {
            return Err(TileError::RegionTooSmall {
                region: "plan",
                required: PLAN_BYTES,
                actual: buf.len(),
            });
        }
        buf[..PLAN_BYTES].copy_from_slice(bytemuck::bytes_of(&self.to_raw()));
        Ok(PLAN_BYTES)
    }

    /// Decode and validate a plan block.
    ///
    /// # Errors
    ///
    /// [`TileError::MalformedPlan`] when the bytes are absent, of the wrong
    /// length, carry a foreign magic or version, or describe a plan that
    /// violates the coverage or fit invariants.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(TileError::MalformedPlan("no plan bytes".into()));
        }
        if bytes.len() != PLAN_BYTES {
            return Err(TileError::MalformedPlan(format!(
                "expected {PLAN_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let raw: RawPlan = bytemuck::pod_read_unaligned(bytes);
        if u64::from_le(raw.magic) != PLAN_MAGIC {
            return Err(TileError::MalformedPlan("bad magic".into()));
        }
        let version = u64::from_le(raw.version);
        if version != PLAN_FORMAT_VERSION {
            return Err(TileError::MalformedPlan(format!(
                "unsupported format version {version}"
            )));
        }
        let strategy = PartitionStrategy::from_code(u64::from_le(raw.strategy)).ok_or_else(
            || TileError::MalformedPlan(format!("unknown strategy {}", u64::from_le(raw.strategy))),
        )?;

        let plan = TilingPlan {
            total_units: field("total_units", raw.total_units)?,
            unit_stride: field("unit_stride", raw.unit_stride)?,
            element_size: field("element_size", raw.element_size)?,
            core_count: field("core_count", raw.core_count)?,
            scratchpad_bytes: field("scratchpad_bytes", raw.scratchpad_bytes)?,
            reserved_bytes: field("reserved_bytes", raw.reserved_bytes)?,
            buffer_multiplier: field("buffer_multiplier", raw.buffer_multiplier)?,
            unit_alignment: field("unit_alignment", raw.unit_alignment)?,
            strategy,
            used_core_count: field("used_core_count", raw.used_core_count)?,
            units_per_core: field("units_per_core", raw.units_per_core)?,
            remainder_cores: field("remainder_cores", raw.remainder_cores)?,
            tail_core_units: field("tail_core_units", raw.tail_core_units)?,
            tile_units_per_loop: field("tile_units_per_loop", raw.tile_units_per_loop)?,
            remainder_loop: LoopShape {
                loops: field("remainder_loops", raw.remainder_loops)?,
                tail_units: field("remainder_tail_units", raw.remainder_tail_units)?,
            },
            common_loop: LoopShape {
                loops: field("common_loops", raw.common_loops)?,
                tail_units: field("common_tail_units", raw.common_tail_units)?,
            },
            tail_loop: LoopShape {
                loops: field("tail_loops", raw.tail_loops)?,
                tail_units: field("tail_tail_units", raw.tail_tail_units)?,
            },
        };
        plan.validate()?;
        Ok(plan)
    }

    fn to_raw(&self) -> RawPlan {
        RawPlan {
            magic: PLAN_MAGIC.to_le(),
            version: PLAN_FORMAT_VERSION.to_le(),
            total_units: le(self.total_units),
            unit_stride: le(self.unit_stride),
            element_size: le(self.element_size),
            core_count: le(self.core_count),
            scratchpad_bytes: le(self.scratchpad_bytes),
            reserved_bytes: le(self.reserved_bytes),
            buffer_multiplier: le(self.buffer_multiplier),
            unit_alignment: le(self.unit_alignment),
            strategy: self.strategy.code().to_le(),
            used_core_count: le(self.used_core_count),
            units_per_core: le(self.units_per_core),
            remainder_cores: le(self.remainder_cores),
            tail_core_units: le(self.tail_core_units),
            tile_units_per_loop: le(self.tile_units_per_loop),
            remainder_loops: le(self.remainder_loop.loops),
            remainder_tail_units: le(self.remainder_loop.tail_units),
            common_loops: le(self.common_loop.loops),
            common_tail_units: le(self.common_loop.tail_units),
            tail_loops: le(self.tail_loop.loops),
            tail_tail_units: le(self.tail_loop.tail_units),
        }
    }
}
