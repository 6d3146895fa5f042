//! Double-buffered tile queues.
//!
//! A [`TileQueue`] owns [`BUFFER_DEPTH`] physical buffer instances and walks
//! each through
//!
//! ```text
//! Free ──alloc──▶ Producing ──enque──▶ Ready ──deque──▶ Consuming ──free──▶ Free
//! ```
//!
//! Every transition is a fence between two pipeline stages. Touching an
//! instance in the wrong state is a [`TileError::FenceViolation`], never a
//! silent overwrite.

use super::scratchpad::Scratchpad;
use crate::align::checked_product;
use crate::error::{Result, TileError};
use crate::plan::BUFFER_DEPTH;
use crate::types::Element;
use std::collections::VecDeque;

/// Bytes accounted per unit for an output route.
pub const ROUTE_BYTES: usize = std::mem::size_of::<u64>();

/// Ownership state of one buffer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Free,
    /// Held by the producing stage.
    Producing,
    /// Published, waiting for the consumer.
    Ready,
    /// Held by the consuming stage.
    Consuming,
}

/// Handle to one buffer instance of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferId(usize);

impl BufferId {
    /// Physical instance index ("ping" = 0, "pong" = 1).
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Instance<B> {
    buffer: B,
    state: BufferState,
    units: usize,
}

/// A ring of buffer instances with explicit ownership states.
#[derive(Debug)]
pub struct TileQueue<B> {
    name: &'static str,
    instances: Vec<Instance<B>>,
    next_alloc: usize,
    ready: VecDeque<usize>,
}

impl<B> TileQueue<B> {
    /// A queue of [`BUFFER_DEPTH`] instances built by `make`.
    pub fn new(name: &'static str, mut make: impl FnMut() -> B) -> Self {
        Self {
            name,
            instances: (0..BUFFER_DEPTH)
                .map(|_| Instance {
                    buffer: make(),
                    state: BufferState::Free,
                    units: 0,
                })
                .collect(),
            next_alloc: 0,
            ready: VecDeque::with_capacity(BUFFER_DEPTH),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn depth(&self) -> usize {
        self.instances.len()
    }

    pub fn state(&self, id: BufferId) -> BufferState {
        self.instances[id.0].state
    }

    /// Instances not currently free.
    pub fn in_flight(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.state != BufferState::Free)
            .count()
    }

    fn violation(&self, detail: String) -> TileError {
        TileError::FenceViolation {
            queue: self.name,
            detail,
        }
    }

    fn expect_state(&self, id: BufferId, want: BufferState, op: &str) -> Result<()> {
        let have = self.instances[id.0].state;
        if have != want {
            return Err(self.violation(format!(
                "{op} on instance {} in state {have:?}, expected {want:?}",
                id.0
            )));
        }
        Ok(())
    }

    /// Claim the next instance in ring order for the producer.
    pub fn alloc(&mut self) -> Result<BufferId> {
        let id = BufferId(self.next_alloc % self.instances.len());
        self.expect_state(id, BufferState::Free, "alloc")?;
        self.instances[id.0].state = BufferState::Producing;
        self.instances[id.0].units = 0;
        self.next_alloc += 1;
        Ok(id)
    }

    /// Producer-side access.
    pub fn buffer_mut(&mut self, id: BufferId) -> Result<&mut B> {
        self.expect_state(id, BufferState::Producing, "write")?;
        Ok(&mut self.instances[id.0].buffer)
    }

    /// Publish a produced instance holding `units` valid units.
    pub fn enque(&mut self, id: BufferId, units: usize) -> Result<()> {
        self.expect_state(id, BufferState::Producing, "enque")?;
        let inst = &mut self.instances[id.0];
        inst.state = BufferState::Ready;
        inst.units = units;
        self.ready.push_back(id.0);
        Ok(())
    }

    /// Take the oldest published instance for the consumer.
    pub fn deque(&mut self) -> Result<BufferId> {
        let idx = self
            .ready
            .pop_front()
            .ok_or_else(|| self.violation("deque with no ready instance".into()))?;
        self.instances[idx].state = BufferState::Consuming;
        Ok(BufferId(idx))
    }

    /// Consumer-side access.
    pub fn buffer(&self, id: BufferId) -> Result<&B> {
        self.expect_state(id, BufferState::Consuming, "read")?;
        Ok(&self.instances[id.0].buffer)
    }

    /// Valid units published with the instance.
    pub fn units(&self, id: BufferId) -> usize {
        self.instances[id.0].units
    }

    /// Return a consumed instance to the ring.
    pub fn free(&mut self, id: BufferId) -> Result<()> {
        self.expect_state(id, BufferState::Consuming, "free")?;
        self.instances[id.0].state = BufferState::Free;
        Ok(())
    }
}

/// Output-side tile buffer: computed rows plus, for routed kernels, the
/// destination slot of each row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBuffer<T> {
    pub values: Vec<T>,
    pub routes: Vec<Option<usize>>,
}

/// Scratchpad footprint of one pipeline slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub tile_units: usize,
    pub input_stride: usize,
    pub output_stride: usize,
    /// Output rows carry a destination route.
    pub routed: bool,
}

impl SlotLayout {
    /// Bytes of all input instances.
    pub fn input_bytes<I: Element>(&self) -> Result<usize> {
        checked_product(
            "input queue bytes",
            &[self.tile_units, self.input_stride, I::size(), BUFFER_DEPTH],
        )
    }

    /// Bytes of all output instances, routes included.
    pub fn output_bytes<O: Element>(&self) -> Result<usize> {
        let row = checked_product("output row bytes", &[self.output_stride, O::size()])?;
        let route = if self.routed { ROUTE_BYTES } else { 0 };
        checked_product(
            "output queue bytes",
            &[self.tile_units, row.saturating_add(route), BUFFER_DEPTH],
        )
    }
}

/// The input and output queue one executor alternates over.
#[derive(Debug)]
pub struct PipelineSlot<I, O> {
    pub input: TileQueue<Vec<I>>,
    pub output: TileQueue<OutputBuffer<O>>,
    reserved: usize,
}

impl<I: Element, O: Element> PipelineSlot<I, O> {
    /// Reserve both queues out of `pad` and allocate their instances.
    pub fn new(layout: SlotLayout, pad: &mut Scratchpad) -> Result<Self> {
        let input_bytes = layout.input_bytes::<I>()?;
        let output_bytes = layout.output_bytes::<O>()?;
        pad.reserve(input_bytes)?;
        if let Err(e) = pad.reserve(output_bytes) {
            pad.release(input_bytes);
            return Err(e);
        }

        let in_len = layout.tile_units * layout.input_stride;
        let out_len = layout.tile_units * layout.output_stride;
        let route_len = if layout.routed { layout.tile_units } else { 0 };
        Ok(Self {
            input: TileQueue::new("input", || vec![I::ZERO; in_len]),
            output: TileQueue::new("output", || OutputBuffer {
                values: vec![O::ZERO; out_len],
                routes: vec![None; route_len],
            }),
            reserved: input_bytes + output_bytes,
        })
    }

    /// Scratchpad bytes held by this slot.
    pub fn reserved_bytes(&self) -> usize {
        self.reserved
    }

    /// Give the slot's bytes back to `pad`.
    pub fn release(self, pad: &mut Scratchpad) {
        pad.release(self.reserved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> TileQueue<Vec<f32>> {
        TileQueue::new("input", || vec![0.0; 4])
    }

    #[test]
    fn test_full_cycle() {
        let mut q = queue();
        let id = q.alloc().unwrap();
        assert_eq!(id.index(), 0);
        q.buffer_mut(id).unwrap()[0] = 1.5;
        q.enque(id, 3).unwrap();
        assert_eq!(q.state(id), BufferState::Ready);

        let got = q.deque().unwrap();
        assert_eq!(got, id);
        assert_eq!(q.units(got), 3);
        assert_eq!(q.buffer(got).unwrap()[0], 1.5);
        q.free(got).unwrap();
        assert_eq!(q.in_flight(), 0);
    }

    #[test]
    fn test_ping_pong_alternates() {
        let mut q = queue();
        let a = q.alloc().unwrap();
        q.enque(a, 4).unwrap();
        let b = q.alloc().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        q.enque(b, 4).unwrap();
        assert_eq!(q.in_flight(), 2);

        // Both instances in flight: a third alloc must wait for a free.
        let err = q.alloc().unwrap_err();
        assert!(matches!(err, TileError::FenceViolation { queue: "input", .. }));

        assert_eq!(q.deque().unwrap(), a);
        q.free(a).unwrap();
        assert_eq!(q.alloc().unwrap(), a);
    }

    #[test]
    fn test_wrong_state_access() {
        let mut q = queue();
        assert!(q.deque().is_err());
        let id = q.alloc().unwrap();
        assert!(q.buffer(id).is_err());
        assert!(q.free(id).is_err());
        q.enque(id, 1).unwrap();
        assert!(q.buffer_mut(id).is_err());
        assert!(q.enque(id, 1).is_err());
    }

    #[test]
    fn test_slot_reserves_scratchpad() {
        let layout = SlotLayout {
            tile_units: 16,
            input_stride: 2,
            output_stride: 1,
            routed: true,
        };
        // in: 16 × 2 × 4 × 2 = 256, out: 16 × (4 + 8) × 2 = 384
        assert_eq!(layout.input_bytes::<f32>().unwrap(), 256);
        assert_eq!(layout.output_bytes::<f32>().unwrap(), 384);

        let mut pad = Scratchpad::new(640);
        let slot = PipelineSlot::<f32, f32>::new(layout, &mut pad).unwrap();
        assert_eq!(slot.reserved_bytes(), 640);
        assert_eq!(slot.output.depth(), 2);
        slot.release(&mut pad);
        assert_eq!(pad.used(), 0);

        let mut pad = Scratchpad::new(639);
        let err = PipelineSlot::<f32, f32>::new(layout, &mut pad).unwrap_err();
        assert!(matches!(err, TileError::ScratchpadExhausted { .. }));
        assert_eq!(pad.used(), 0);
    }
}
