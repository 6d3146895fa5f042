use super::scalar::Element;
use super::traits::Accumulate;
use std::fmt;

/// Minimum accumulation: `combine = min`, `identity = highest value`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Min<T: Element>(pub T);

impl<T: Element> Default for Min<T> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<T: Element> Accumulate for Min<T> {
    type Scalar = T;

    #[inline(always)]
    fn identity() -> Self {
        Min(T::HIGHEST)
    }

    #[inline(always)]
    fn combine(self, other: Self) -> Self {
        if other.0 < self.0 || self.0 != self.0 {
            other
        } else if other.0 == self.0 && other.0.to_word() > self.0.to_word() {
            // Equal values with different bits are signed zeros; prefer -0.0.
            other
        } else {
            self
        }
    }

    #[inline(always)]
    fn from_scalar(s: T) -> Self {
        Min(s)
    }

    #[inline(always)]
    fn value(self) -> T {
        self.0
    }
}

impl<T: Element + fmt::Display> fmt::Display for Min<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min({})", self.0)
    }
}
