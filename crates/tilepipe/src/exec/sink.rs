//! Where CopyOut puts finished rows.
//!
//! Disjoint placement hands each core the exclusive slice of the output it
//! owns, so plain stores suffice. Routed (many-to-one) placement shares one
//! [`SharedSink`] between all cores and merges rows with a commutative
//! monoid, which makes the final value independent of core completion order.

use crate::error::{Result, TileError};
use crate::types::{Accumulate, Element};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Destination of one core's output rows.
pub trait TileSink<T: Element> {
    /// Emit the row destined for output slot `slot`.
    fn emit(&mut self, slot: usize, row: &[T]) -> Result<()>;
}

/// A core's exclusive chunk of a disjoint output region.
#[derive(Debug)]
pub struct CoreChunk<'a, T> {
    chunk: &'a mut [T],
    first_slot: usize,
    stride: usize,
}

impl<'a, T: Element> CoreChunk<'a, T> {
    /// `chunk` holds slots `first_slot..` of `stride` scalars each.
    pub fn new(chunk: &'a mut [T], first_slot: usize, stride: usize) -> Self {
        Self {
            chunk,
            first_slot,
            stride,
        }
    }
}

impl<T: Element> TileSink<T> for CoreChunk<'_, T> {
    fn emit(&mut self, slot: usize, row: &[T]) -> Result<()> {
        let stride = self.stride;
        let actual = self.first_slot * stride + self.chunk.len();
        let out_of_chunk = || TileError::RegionTooSmall {
            region: "output chunk",
            required: slot.saturating_add(1).saturating_mul(stride),
            actual,
        };
        let local = slot.checked_sub(self.first_slot).ok_or_else(out_of_chunk)?;
        let start = local * self.stride;
        let dst = self
            .chunk
            .get_mut(start..start + row.len())
            .ok_or_else(out_of_chunk)?;
        dst.copy_from_slice(row);
        Ok(())
    }
}

/// An output region every core may merge into concurrently.
pub trait SharedSink<T: Element>: Sync {
    /// Addressable scalars.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge `value` into scalar `index`. Callers keep `index < len()`.
    fn accumulate(&self, index: usize, value: T);
}

/// Per-core adapter that merges rows into a [`SharedSink`].
pub struct Merge<'a, S: ?Sized> {
    sink: &'a S,
    stride: usize,
}

impl<'a, S: ?Sized> Merge<'a, S> {
    pub fn new(sink: &'a S, stride: usize) -> Self {
        Self { sink, stride }
    }
}

impl<T: Element, S: SharedSink<T> + ?Sized> TileSink<T> for Merge<'_, S> {
    fn emit(&mut self, slot: usize, row: &[T]) -> Result<()> {
        let base = slot.saturating_mul(self.stride);
        let end = base.saturating_add(row.len());
        if end > self.sink.len() {
            return Err(TileError::RegionTooSmall {
                region: "output",
                required: end,
                actual: self.sink.len(),
            });
        }
        for (j, &v) in row.iter().enumerate() {
            self.sink.accumulate(base + j, v);
        }
        Ok(())
    }
}

/// Lock-free accumulating region: one `AtomicU64` per scalar, merged with a
/// compare-and-swap loop.
///
/// # Example
///
/// ```
/// use tilepipe::exec::{AtomicSlots, SharedSink};
/// use tilepipe::types::Sum;
///
/// let slots = AtomicSlots::<Sum<i64>>::new(2);
/// slots.accumulate(1, 5);
/// slots.accumulate(1, -2);
/// assert_eq!(slots.to_vec(), vec![0, 3]);
/// ```
pub struct AtomicSlots<A: Accumulate> {
    words: Vec<AtomicU64>,
    _marker: PhantomData<A>,
}

impl<A: Accumulate> AtomicSlots<A> {
    /// `len` scalars at the monoid identity.
    pub fn new(len: usize) -> Self {
        let word = A::identity_scalar().to_word();
        Self {
            words: (0..len).map(|_| AtomicU64::new(word)).collect(),
            _marker: PhantomData,
        }
    }

    /// Start from existing values.
    pub fn from_values(values: &[A::Scalar]) -> Self {
        Self {
            words: values.iter().map(|v| AtomicU64::new(v.to_word())).collect(),
            _marker: PhantomData,
        }
    }

    pub fn get(&self, index: usize) -> Option<A::Scalar> {
        self.words
            .get(index)
            .map(|w| A::Scalar::from_word(w.load(Ordering::Acquire)))
    }

    /// Snapshot of every scalar.
    pub fn to_vec(&self) -> Vec<A::Scalar> {
        self.words
            .iter()
            .map(|w| A::Scalar::from_word(w.load(Ordering::Acquire)))
            .collect()
    }

    pub fn into_vec(self) -> Vec<A::Scalar> {
        self.words
            .into_iter()
            .map(|w| A::Scalar::from_word(w.into_inner()))
            .collect()
    }

    /// Put every scalar back to the identity.
    pub fn reset(&self) {
        let word = A::identity_scalar().to_word();
        for w in &self.words {
            w.store(word, Ordering::Release);
        }
    }
}

impl<A: Accumulate> SharedSink<A::Scalar> for AtomicSlots<A> {
    fn len(&self) -> usize {
        self.words.len()
    }

    fn accumulate(&self, index: usize, value: A::Scalar) {
        let Some(word) = self.words.get(index) else {
            return;
        };
        let mut current = word.load(Ordering::Relaxed);
        loop {
            let merged = A::combine_scalars(A::Scalar::from_word(current), value).to_word();
            if merged == current {
                return;
            }
            match word.compare_exchange_weak(current, merged, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<A: Accumulate> fmt::Debug for AtomicSlots<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicSlots")
            .field("len", &self.words.len())
            .finish()
    }
}
