use std::fmt::Debug;
use std::ops::Add;

/// Scalar type that can live in a global region or a scratchpad tile.
///
/// Elements round-trip through a 64-bit word so that lock-free sinks can
/// store any of them in an `AtomicU64`.
pub trait Element:
    Copy + Default + Debug + PartialEq + PartialOrd + Add<Output = Self> + Send + Sync + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Smallest representable value (−∞ for floats).
    const LOWEST: Self;
    /// Largest representable value (+∞ for floats).
    const HIGHEST: Self;

    /// Bit pattern widened to 64 bits.
    fn to_word(self) -> u64;

    /// Inverse of [`Element::to_word`].
    fn from_word(word: u64) -> Self;

    /// Size in bytes, as used by the planner's `element_size`.
    #[inline]
    fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

impl Element for f32 {
    const ZERO: Self = 0.0;
    const LOWEST: Self = f32::NEG_INFINITY;
    const HIGHEST: Self = f32::INFINITY;

    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_word(word: u64) -> Self {
        f32::from_bits(word as u32)
    }
}

impl Element for f64 {
    const ZERO: Self = 0.0;
    const LOWEST: Self = f64::NEG_INFINITY;
    const HIGHEST: Self = f64::INFINITY;

    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_word(word: u64) -> Self {
        f64::from_bits(word)
    }
}

macro_rules! impl_element_int {
    ($($t:ty => $unsigned:ty),* $(,)?) => {
        $(
            impl Element for $t {
                const ZERO: Self = 0;
                const LOWEST: Self = <$t>::MIN;
                const HIGHEST: Self = <$t>::MAX;

                #[inline]
                fn to_word(self) -> u64 {
                    self as $unsigned as u64
                }

                #[inline]
                fn from_word(word: u64) -> Self {
                    word as $unsigned as $t
                }
            }
        )*
    };
}

impl_element_int! {
    i32 => u32,
    i64 => u64,
    u32 => u32,
    u64 => u64,
}
