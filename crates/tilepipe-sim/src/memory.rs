//! Global memory regions of the simulated device.

use crate::error::{Result, SimError};
use tilepipe::exec::{AtomicSlots, SharedSink};
use tilepipe::types::{Accumulate, Element};

fn validate_units<T>(data: &[T], units: usize, unit_stride: usize) -> Result<()> {
    if unit_stride == 0 {
        return Err(SimError::DimensionMismatch("unit stride is zero".into()));
    }
    let expected = units.checked_mul(unit_stride).ok_or_else(|| {
        SimError::DimensionMismatch(format!("{units} units of {unit_stride} overflow"))
    })?;
    if data.len() != expected {
        return Err(SimError::DimensionMismatch(format!(
            "Expected {} elements, got {}",
            expected,
            data.len()
        )));
    }
    Ok(())
}

/// A region of device global memory laid out as `units` back-to-back units
/// of `unit_stride` scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalBuffer<T: Element> {
    data: Vec<T>,
    units: usize,
    unit_stride: usize,
}

impl<T: Element> GlobalBuffer<T> {
    /// Upload host data. Its length must be a whole number of units.
    pub fn from_host(data: &[T], unit_stride: usize) -> Result<Self> {
        if unit_stride == 0 {
            return Err(SimError::DimensionMismatch("unit stride is zero".into()));
        }
        let units = data.len() / unit_stride;
        validate_units(data, units, unit_stride)?;
        Ok(Self {
            data: data.to_vec(),
            units,
            unit_stride,
        })
    }

    /// Allocate a zeroed region.
    pub fn alloc(units: usize, unit_stride: usize) -> Result<Self> {
        let len = units.checked_mul(unit_stride).ok_or_else(|| {
            SimError::DimensionMismatch(format!("{units} units of {unit_stride} overflow"))
        })?;
        let data = vec![T::ZERO; len];
        validate_units(&data, units, unit_stride)?;
        Ok(Self {
            data,
            units,
            unit_stride,
        })
    }

    /// Copy the region back to the host.
    pub fn to_host(&self) -> Vec<T> {
        self.data.clone()
    }

    pub fn into_host(self) -> Vec<T> {
        self.data
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn unit_stride(&self) -> usize {
        self.unit_stride
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Global output region that every core merges into with monoid `A`.
///
/// Slots start at the monoid identity. Merges are lock-free and
/// order-independent; an index past the end is rejected by the per-core
/// [`Merge`](tilepipe::exec::Merge) adapter before it reaches the region.
#[derive(Debug)]
pub struct AtomicOutput<A: Accumulate> {
    slots: AtomicSlots<A>,
    slot_stride: usize,
}

impl<A: Accumulate> AtomicOutput<A> {
    /// `slots` output slots of `slot_stride` scalars, at the identity.
    pub fn alloc(slots: usize, slot_stride: usize) -> Result<Self> {
        if slot_stride == 0 {
            return Err(SimError::DimensionMismatch("slot stride is zero".into()));
        }
        let len = slots.checked_mul(slot_stride).ok_or_else(|| {
            SimError::DimensionMismatch(format!("{slots} slots of {slot_stride} overflow"))
        })?;
        Ok(Self {
            slots: AtomicSlots::new(len),
            slot_stride,
        })
    }

    /// Start from existing host values.
    pub fn from_host(data: &[A::Scalar], slot_stride: usize) -> Result<Self> {
        if slot_stride == 0 || data.len() % slot_stride != 0 {
            return Err(SimError::DimensionMismatch(format!(
                "{} elements are not whole slots of {slot_stride}",
                data.len()
            )));
        }
        Ok(Self {
            slots: AtomicSlots::from_values(data),
            slot_stride,
        })
    }

    pub fn slots(&self) -> usize {
        self.slots.len() / self.slot_stride
    }

    pub fn slot_stride(&self) -> usize {
        self.slot_stride
    }

    /// Scalar at flat index `index`.
    pub fn get(&self, index: usize) -> Option<A::Scalar> {
        self.slots.get(index)
    }

    /// Snapshot of the region.
    pub fn to_host(&self) -> Vec<A::Scalar> {
        self.slots.to_vec()
    }

    pub fn into_host(self) -> Vec<A::Scalar> {
        self.slots.into_vec()
    }

    /// Put every slot back to the identity.
    pub fn reset(&self) {
        self.slots.reset();
    }
}

impl<A: Accumulate> SharedSink<A::Scalar> for AtomicOutput<A> {
    fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn accumulate(&self, index: usize, value: A::Scalar) {
        self.slots.accumulate(index, value);
    }
}
