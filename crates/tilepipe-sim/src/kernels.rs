//! Demonstration kernels.
//!
//! | Kernel | Unit in | Row out | Placement |
//! |--------|---------|---------|-----------|
//! | [`Scale`] | `stride` scalars | `stride` scalars | disjoint |
//! | [`ScatterSum`] | `[slot, value]` | `value` | merged with `+` |
//! | [`ScatterMax`] | `[slot, value]` | `value` | merged with `max` |
//! | [`ScatterMin`] | `[slot, value]` | `value` | merged with `min` |

use std::marker::PhantomData;
use tilepipe::exec::{InputTile, OutputTile, TileKernel};
use tilepipe::types::{Accumulate, Element, Max, Min, Sum};

/// Scalars that can name an output slot.
pub trait SlotKey: Element {
    /// The slot this key names; `None` for negative or non-integral keys.
    fn slot(self) -> Option<usize>;
}

macro_rules! impl_slot_key_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl SlotKey for $t {
                #[inline]
                fn slot(self) -> Option<usize> {
                    usize::try_from(self).ok()
                }
            }
        )*
    };
}

impl_slot_key_int!(i32, i64, u32, u64);

macro_rules! impl_slot_key_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl SlotKey for $t {
                #[inline]
                fn slot(self) -> Option<usize> {
                    if self >= 0.0 && self.fract() == 0.0 && self < usize::MAX as $t {
                        Some(self as usize)
                    } else {
                        None
                    }
                }
            }
        )*
    };
}

impl_slot_key_float!(f32, f64);

/// A routed kernel paired with the monoid its output is merged with.
pub trait Reduction: TileKernel {
    /// Merge applied at the output slots.
    type Acc: Accumulate<Scalar = Self::Out>;

    /// Output slots the kernel routes into.
    fn slots(&self) -> usize;
}

/// Multiply every scalar by a constant factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale<T> {
    factor: T,
    stride: usize,
}

impl<T: Element> Scale<T> {
    pub fn new(factor: T, stride: usize) -> Self {
        Self { factor, stride }
    }

    pub fn factor(&self) -> T {
        self.factor
    }
}

macro_rules! impl_scale_kernel {
    ($($t:ty),* $(,)?) => {
        $(
            impl TileKernel for Scale<$t> {
                type In = $t;
                type Out = $t;

                fn unit_stride(&self) -> usize {
                    self.stride
                }

                fn compute(&self, tile: &InputTile<'_, $t>, out: &mut OutputTile<'_, $t>) {
                    for (o, &x) in out.as_mut_slice().iter_mut().zip(tile.as_slice()) {
                        *o = x * self.factor;
                    }
                }
            }
        )*
    };
}

impl_scale_kernel!(f32, f64, i32, i64, u32, u64);

fn scatter<T: SlotKey>(slots: usize, tile: &InputTile<'_, T>, out: &mut OutputTile<'_, T>) {
    for i in 0..tile.units() {
        let unit = tile.unit(i);
        out.unit_mut(i)[0] = unit[1];
        out.route(i, unit[0].slot().filter(|&s| s < slots));
    }
}

/// Generate a scatter kernel per monoid. Units are `[slot, value]` pairs;
/// keys that name no slot below `slots` are dropped.
macro_rules! impl_scatter_kernel {
    ($($(#[$meta:meta])* $name:ident => $acc:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name<T> {
                slots: usize,
                _marker: PhantomData<T>,
            }

            impl<T: SlotKey> $name<T> {
                pub fn new(slots: usize) -> Self {
                    Self {
                        slots,
                        _marker: PhantomData,
                    }
                }
            }

            impl<T: SlotKey> TileKernel for $name<T> {
                type In = T;
                type Out = T;

                fn unit_stride(&self) -> usize {
                    2
                }

                fn output_stride(&self) -> usize {
                    1
                }

                fn routes_output(&self) -> bool {
                    true
                }

                fn compute(&self, tile: &InputTile<'_, T>, out: &mut OutputTile<'_, T>) {
                    scatter(self.slots, tile, out);
                }
            }

            impl<T: SlotKey> Reduction for $name<T> {
                type Acc = $acc<T>;

                fn slots(&self) -> usize {
                    self.slots
                }
            }
        )*
    };
}

impl_scatter_kernel! {
    /// Scatter-add: `out[slot] += value`.
    ScatterSum => Sum,
    /// Scatter-max: `out[slot] = max(out[slot], value)`.
    ScatterMax => Max,
    /// Scatter-min: `out[slot] = min(out[slot], value)`.
    ScatterMin => Min,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilepipe::KernelProfile;

    #[test]
    fn test_slot_keys() {
        assert_eq!(3i64.slot(), Some(3));
        assert_eq!((-1i32).slot(), None);
        assert_eq!(7.0f32.slot(), Some(7));
        assert_eq!(7.5f64.slot(), None);
        assert_eq!(f32::NAN.slot(), None);
        assert_eq!((-0.0f64).slot(), Some(0));
    }

    #[test]
    fn test_scatter_profiles() {
        // 2 × (2·8 in + 1·8 out + 8 route) = 64 bytes per 16-byte input unit.
        let k = ScatterSum::<i64>::new(10);
        assert_eq!(KernelProfile::for_kernel(&k).buffer_multiplier, 4);
        assert_eq!(k.slots(), 10);
        assert!(ScatterMax::<f32>::new(1).routes_output());
    }

    #[test]
    fn test_scale_profile() {
        let k = Scale::new(2.0f32, 3);
        assert_eq!(k.unit_stride(), 3);
        assert_eq!(k.output_stride(), 3);
        assert_eq!(KernelProfile::for_kernel(&k).buffer_multiplier, 4);
    }
}
