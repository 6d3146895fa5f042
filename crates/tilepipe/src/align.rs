//! Division and alignment arithmetic shared by the planner and the executor.
//!
//! Every helper treats a zero divisor as "no alignment required" and behaves
//! as if the divisor were 1, so a descriptor with `alignment_bytes == 0`
//! degrades to an unaligned plan instead of a division by zero.
//!
//! | Helper | Result | `b == 0` |
//! |--------|--------|----------|
//! | [`div_ceil`] | ⌈a / b⌉ | `a` |
//! | [`div_floor`] | ⌊a / b⌋ | `a` |
//! | [`ceil_align`] | smallest multiple of `b` ≥ `a` | `a` |
//! | [`floor_align`] | largest multiple of `b` ≤ `a` | `a` |

use crate::error::{Result, TileError};

/// ⌈a / b⌉, with `b == 0` treated as 1.
#[inline]
pub const fn div_ceil(a: usize, b: usize) -> usize {
    if b == 0 {
        return a;
    }
    a / b + (a % b != 0) as usize
}

/// ⌊a / b⌋, with `b == 0` treated as 1.
#[inline]
pub const fn div_floor(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        a / b
    }
}

/// Round `a` up to a multiple of `b`.
///
/// Saturates at the largest multiple of `b` representable in `usize`; callers
/// that cannot tolerate saturation use [`checked_ceil_align`].
#[inline]
pub const fn ceil_align(a: usize, b: usize) -> usize {
    if b == 0 {
        return a;
    }
    match div_ceil(a, b).checked_mul(b) {
        Some(v) => v,
        None => usize::MAX / b * b,
    }
}

/// Round `a` up to a multiple of `b`, failing on overflow.
#[inline]
pub fn checked_ceil_align(a: usize, b: usize) -> Result<usize> {
    if b == 0 {
        return Ok(a);
    }
    div_ceil(a, b)
        .checked_mul(b)
        .ok_or_else(|| TileError::Overflow(format!("ceil_align({a}, {b})")))
}

/// Round `a` down to a multiple of `b`.
#[inline]
pub const fn floor_align(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        a / b * b
    }
}

/// Alignment granularity in scalar elements for a given byte alignment.
///
/// `alignment_bytes / element_size`, or 1 when either is zero or the
/// alignment is finer than one element.
#[inline]
pub const fn unit_alignment(alignment_bytes: usize, element_size: usize) -> usize {
    if element_size == 0 || alignment_bytes < element_size {
        1
    } else {
        alignment_bytes / element_size
    }
}

/// Multiply a chain of factors, reporting which product overflowed.
pub fn checked_product(what: &str, factors: &[usize]) -> Result<usize> {
    factors.iter().try_fold(1usize, |acc, &f| {
        acc.checked_mul(f)
            .ok_or_else(|| TileError::Overflow(format!("{what}: {factors:?}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(0, 8), 0);
        assert_eq!(div_ceil(1, 8), 1);
        assert_eq!(div_ceil(8, 8), 1);
        assert_eq!(div_ceil(9, 8), 2);
        assert_eq!(div_ceil(usize::MAX, 2), usize::MAX / 2 + 1);
    }

    #[test]
    fn test_zero_divisor_is_identity() {
        assert_eq!(div_ceil(13, 0), 13);
        assert_eq!(div_floor(13, 0), 13);
        assert_eq!(ceil_align(13, 0), 13);
        assert_eq!(floor_align(13, 0), 13);
        assert_eq!(checked_ceil_align(13, 0).unwrap(), 13);
    }

    #[test]
    fn test_alignment_rounding() {
        assert_eq!(ceil_align(125, 8), 128);
        assert_eq!(ceil_align(128, 8), 128);
        assert_eq!(floor_align(127, 8), 120);
        assert_eq!(floor_align(7, 8), 0);
    }

    #[test]
    fn test_ceil_align_overflow() {
        assert!(checked_ceil_align(usize::MAX, 8).is_err());
        assert_eq!(ceil_align(usize::MAX, 8), usize::MAX / 8 * 8);
    }

    #[test]
    fn test_unit_alignment() {
        assert_eq!(unit_alignment(32, 4), 8);
        assert_eq!(unit_alignment(32, 2), 16);
        assert_eq!(unit_alignment(0, 4), 1);
        assert_eq!(unit_alignment(32, 0), 1);
        assert_eq!(unit_alignment(2, 8), 1);
    }

    #[test]
    fn test_checked_product() {
        assert_eq!(checked_product("tile", &[3, 4, 5]).unwrap(), 60);
        assert_eq!(checked_product("tile", &[]).unwrap(), 1);
        let err = checked_product("tile", &[usize::MAX, 2]).unwrap_err();
        assert!(err.to_string().contains("tile"));
    }
}
