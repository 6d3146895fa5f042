use super::scalar::Element;
use super::traits::Accumulate;
use std::fmt;

/// Maximum accumulation: `combine = max`, `identity = lowest value`.
///
/// NaN loses against any number, so a NaN contribution never masks a real
/// maximum regardless of arrival order.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Max<T: Element>(pub T);

impl<T: Element> Default for Max<T> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<T: Element> Accumulate for Max<T> {
    type Scalar = T;

    #[inline(always)]
    fn identity() -> Self {
        Max(T::LOWEST)
    }

    #[inline(always)]
    fn combine(self, other: Self) -> Self {
        if other.0 > self.0 || self.0 != self.0 {
            other
        } else if other.0 == self.0 && other.0.to_word() < self.0.to_word() {
            // Equal values with different bits are signed zeros; prefer +0.0.
            other
        } else {
            self
        }
    }

    #[inline(always)]
    fn from_scalar(s: T) -> Self {
        Max(s)
    }

    #[inline(always)]
    fn value(self) -> T {
        self.0
    }
}

impl<T: Element + fmt::Display> fmt::Display for Max<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max({})", self.0)
    }
}
