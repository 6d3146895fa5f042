//! Element and accumulation type definitions.
//!
//! Output regions that more than one core can reach are merged with a
//! **commutative monoid**: an associative, commutative `combine` with an
//! identity. Because the merge does not care about order, the unspecified
//! completion order of cores cannot change the final value.
//!
//! | Type | combine | identity | Use case |
//! |------|---------|----------|----------|
//! | [`Sum<T>`] | a + b | 0 | scatter-add, voxel/grid aggregation |
//! | [`Max<T>`] | max(a, b) | lowest value | scatter-max, max pooling |
//! | [`Min<T>`] | min(a, b) | highest value | nearest-distance reductions |
//!
//! Floating-point addition is only associative up to rounding; callers that
//! need bit-identical results under any interleaving accumulate integers or
//! exactly representable values.
//!
//! # Example
//!
//! ```rust
//! use tilepipe::types::{Accumulate, Max, Sum};
//!
//! let a = Sum::from_scalar(3i64);
//! let b = Sum::from_scalar(5i64);
//! assert_eq!(a.combine(b).value(), 8);
//!
//! let m = Max::from_scalar(3.0f32).combine(Max::from_scalar(-1.0));
//! assert_eq!(m.value(), 3.0);
//! ```

mod max;
mod min;
mod scalar;
mod sum;
mod traits;

pub use max::Max;
pub use min::Min;
pub use scalar::Element;
pub use sum::Sum;
pub use traits::Accumulate;
