use super::scalar::Element;
use std::fmt::Debug;

/// A commutative monoid used to merge contributions into shared output.
///
/// Laws every implementation must satisfy:
/// - `a.combine(b) == b.combine(a)`
/// - `a.combine(b).combine(c) == a.combine(b.combine(c))`
/// - `a.combine(identity()) == a`
pub trait Accumulate: Copy + Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The underlying scalar type.
    type Scalar: Element;

    /// The monoid identity; freshly allocated accumulators start here.
    fn identity() -> Self;

    /// Merge two values.
    fn combine(self, other: Self) -> Self;

    /// Wrap a scalar.
    fn from_scalar(s: Self::Scalar) -> Self;

    /// Unwrap to the scalar.
    fn value(self) -> Self::Scalar;

    /// Merge two raw scalars.
    #[inline(always)]
    fn combine_scalars(a: Self::Scalar, b: Self::Scalar) -> Self::Scalar {
        Self::from_scalar(a).combine(Self::from_scalar(b)).value()
    }

    /// Identity as a raw scalar.
    #[inline(always)]
    fn identity_scalar() -> Self::Scalar {
        Self::identity().value()
    }
}
