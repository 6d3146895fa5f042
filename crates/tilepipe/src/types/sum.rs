use super::scalar::Element;
use super::traits::Accumulate;
use std::fmt;

/// Additive accumulation: `combine = +`, `identity = 0`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[repr(transparent)]
pub struct Sum<T: Element>(pub T);

impl<T: Element> Accumulate for Sum<T> {
    type Scalar = T;

    #[inline(always)]
    fn identity() -> Self {
        Sum(T::ZERO)
    }

    #[inline(always)]
    fn combine(self, other: Self) -> Self {
        Sum(self.0 + other.0)
    }

    #[inline(always)]
    fn from_scalar(s: T) -> Self {
        Sum(s)
    }

    #[inline(always)]
    fn value(self) -> T {
        self.0
    }
}

impl<T: Element + fmt::Display> fmt::Display for Sum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Σ{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let a = Sum::from_scalar(5i64);
        assert_eq!(a.combine(Sum::identity()), a);
        assert_eq!(Sum::<f32>::identity_scalar(), 0.0);
    }

    #[test]
    fn test_commutative() {
        let a = Sum(3i32);
        let b = Sum(-9i32);
        assert_eq!(a.combine(b), b.combine(a));
        assert_eq!(Sum::<i32>::combine_scalars(3, -9), -6);
    }
}
