//! The per-tile compute contract.

use super::queue::{SlotLayout, ROUTE_BYTES};
use crate::align::div_ceil;
use crate::plan::{KernelProfile, TilingPlan, WorkloadDescriptor, BUFFER_DEPTH};
use crate::types::Element;

/// A data-parallel kernel the executor can drive over tiles.
///
/// A kernel contributes its strides and one compute function; partitioning,
/// transfers and buffering are the executor's business.
///
/// # Example
///
/// ```
/// use tilepipe::exec::{InputTile, OutputTile, TileKernel};
///
/// struct Negate;
///
/// impl TileKernel for Negate {
///     type In = f32;
///     type Out = f32;
///
///     fn unit_stride(&self) -> usize {
///         1
///     }
///
///     fn compute(&self, tile: &InputTile<'_, f32>, out: &mut OutputTile<'_, f32>) {
///         for i in 0..tile.units() {
///             out.unit_mut(i)[0] = -tile.unit(i)[0];
///         }
///     }
/// }
/// ```
pub trait TileKernel: Sync {
    type In: Element;
    type Out: Element;

    /// Input scalars per unit.
    fn unit_stride(&self) -> usize;

    /// Output scalars per unit.
    fn output_stride(&self) -> usize {
        self.unit_stride()
    }

    /// Whether `compute` sends rows to arbitrary output slots via
    /// [`OutputTile::route`]. Unrouted rows land at their own unit index.
    fn routes_output(&self) -> bool {
        false
    }

    /// Transform one tile. Only the first `tile.units()` rows are valid.
    fn compute(&self, tile: &InputTile<'_, Self::In>, out: &mut OutputTile<'_, Self::Out>);
}

/// Scratchpad bytes one unit costs across both buffer instances of every
/// queue the executor keeps for `kernel`.
pub fn pipeline_bytes_per_unit<K: TileKernel>(kernel: &K) -> usize {
    let route = if kernel.routes_output() { ROUTE_BYTES } else { 0 };
    kernel
        .unit_stride()
        .saturating_mul(K::In::size())
        .saturating_add(kernel.output_stride().saturating_mul(K::Out::size()))
        .saturating_add(route)
        .saturating_mul(BUFFER_DEPTH)
}

impl KernelProfile {
    /// Profile whose buffer multiplier covers `kernel`'s whole pipeline.
    pub fn for_kernel<K: TileKernel>(kernel: &K) -> Self {
        let input_unit = kernel.unit_stride().saturating_mul(K::In::size());
        let multiplier = div_ceil(pipeline_bytes_per_unit(kernel), input_unit).max(1);
        Self::default().buffers(multiplier)
    }
}

impl WorkloadDescriptor {
    /// Descriptor for `total_units` units of `kernel`'s input.
    pub fn for_kernel<K: TileKernel>(kernel: &K, total_units: usize) -> Self {
        Self::new(total_units, kernel.unit_stride(), K::In::size())
    }
}

pub(crate) fn slot_layout<K: TileKernel>(plan: &TilingPlan, kernel: &K) -> SlotLayout {
    SlotLayout {
        tile_units: plan.tile_units_per_loop,
        input_stride: kernel.unit_stride(),
        output_stride: kernel.output_stride(),
        routed: kernel.routes_output(),
    }
}

/// Read view of one input tile in the scratchpad.
#[derive(Debug, Clone, Copy)]
pub struct InputTile<'a, T> {
    data: &'a [T],
    units: usize,
    stride: usize,
    first_unit: usize,
}

impl<'a, T: Element> InputTile<'a, T> {
    pub(crate) fn new(data: &'a [T], units: usize, stride: usize, first_unit: usize) -> Self {
        Self {
            data,
            units,
            stride,
            first_unit,
        }
    }

    /// Valid units in this tile.
    pub fn units(&self) -> usize {
        self.units
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Global index of the tile's first unit.
    pub fn first_unit(&self) -> usize {
        self.first_unit
    }

    /// Scalars of unit `i`.
    pub fn unit(&self, i: usize) -> &'a [T] {
        &self.data[i * self.stride..(i + 1) * self.stride]
    }

    /// The valid scalars.
    pub fn as_slice(&self) -> &'a [T] {
        &self.data[..self.units * self.stride]
    }

    /// The whole buffer instance, zero-filled past the valid units.
    pub fn padded(&self) -> &'a [T] {
        self.data
    }
}

/// Write view of one output tile in the scratchpad.
#[derive(Debug)]
pub struct OutputTile<'a, T> {
    values: &'a mut [T],
    routes: &'a mut [Option<usize>],
    units: usize,
    stride: usize,
}

impl<'a, T: Element> OutputTile<'a, T> {
    pub(crate) fn new(
        values: &'a mut [T],
        routes: &'a mut [Option<usize>],
        units: usize,
        stride: usize,
    ) -> Self {
        Self {
            values,
            routes,
            units,
            stride,
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Output scalars of unit `i`.
    pub fn unit_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.values[i * self.stride..(i + 1) * self.stride]
    }

    /// The valid output scalars.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values[..self.units * self.stride]
    }

    /// Send row `i` to output slot `slot`; `None` drops the row.
    ///
    /// Ignored by kernels that do not route their output.
    pub fn route(&mut self, i: usize, slot: Option<usize>) {
        if let Some(r) = self.routes.get_mut(i) {
            *r = slot;
        }
    }
}
